//! Field validators shared by the API layer.
//!
//! Every checker either returns the normalized value or an
//! [`AppError::Validation`] describing what is wrong with the input. None of
//! them touch the database; uniqueness is checked by the services.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::{ValidateEmail, ValidateUrl};

use crate::error::{AppError, AppResult};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]{2,29}$").expect("valid username regex"));

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\p{L}+(?:[ '\-]\p{L}+)*$").expect("valid name regex")
});

static RELATIONSHIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{L}+(?: \p{L}+)*$").expect("valid relationship regex"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("valid phone regex"));

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

/// Trimmed, lowercased email address
pub fn email(value: &str) -> AppResult<String> {
    let value = value.trim().to_lowercase();
    if value.validate_email() {
        Ok(value)
    } else {
        Err(invalid(format!("Invalid email address: {}", value)))
    }
}

/// Normalize a phone number to E.164 (`+` followed by 8 to 15 digits).
///
/// Separators are dropped, an international `00` prefix becomes `+` and a
/// national number starting with `0` gets `default_country_code` in place of
/// that trunk prefix.
pub fn phone(value: &str, default_country_code: &str) -> AppResult<String> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let normalized = if let Some(rest) = compact.strip_prefix("00") {
        format!("+{}", rest)
    } else if compact.starts_with('+') {
        compact
    } else if let Some(rest) = compact.strip_prefix('0') {
        format!("{}{}", default_country_code.trim(), rest)
    } else {
        format!("+{}", compact)
    };

    if PHONE_RE.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(invalid(format!("Invalid phone number: {}", value.trim())))
    }
}

/// Compact uppercase ISBN-10 or ISBN-13 with a valid check digit
pub fn isbn(value: &str) -> AppResult<String> {
    let compact: String = value
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let valid = match compact.len() {
        10 => isbn10_checksum_ok(&compact),
        13 => isbn13_checksum_ok(&compact),
        _ => false,
    };

    if valid {
        Ok(compact)
    } else {
        Err(invalid(format!("Invalid ISBN: {}", value.trim())))
    }
}

fn isbn10_checksum_ok(isbn: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in isbn.chars().enumerate() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'X' if i == 9 => 10,
            _ => return false,
        };
        sum += digit * (10 - i as u32);
    }
    sum % 11 == 0
}

fn isbn13_checksum_ok(isbn: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in isbn.chars().enumerate() {
        let Some(digit) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { digit } else { digit * 3 };
    }
    sum % 10 == 0
}

pub fn username(value: &str) -> AppResult<String> {
    let value = value.trim();
    if USERNAME_RE.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(invalid(
            "Username must be 3-30 characters, start with a letter and contain only letters, digits, '_' or '.'",
        ))
    }
}

/// First or last name
pub fn name(value: &str) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if (2..=50).contains(&len) && NAME_RE.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(invalid(format!("Invalid name: {}", value)))
    }
}

/// Full name made of at least two valid names
pub fn full_name(value: &str) -> AppResult<String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(invalid("Full name must contain at least a first and a last name"));
    }
    for part in &parts {
        name(part)?;
    }
    Ok(parts.join(" "))
}

pub fn address(value: &str) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if (5..=200).contains(&len) {
        Ok(value.to_string())
    } else {
        Err(invalid("Address must be between 5 and 200 characters"))
    }
}

/// Guarantor relationship (e.g. "father", "employer")
pub fn relationship(value: &str) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if (2..=30).contains(&len) && RELATIONSHIP_RE.is_match(value) {
        Ok(value.to_lowercase())
    } else {
        Err(invalid(format!("Invalid relationship: {}", value)))
    }
}

pub fn password(value: &str) -> AppResult<()> {
    if value.chars().count() < 8 {
        return Err(invalid("Password must be at least 8 characters long"));
    }
    if !value.chars().any(|c| c.is_alphabetic()) || !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid("Password must contain at least one letter and one digit"));
    }
    Ok(())
}

/// `YYYY-MM-DD`
pub fn date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(format!("Invalid date '{}': expected YYYY-MM-DD", value.trim())))
}

/// Optional `YYYY-MM-DD` query filter
pub fn date_filter(field: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(format!("Invalid {}: must be in YYYY-MM-DD format", field))),
    }
}

pub fn birth_date(value: &str, today: NaiveDate) -> AppResult<NaiveDate> {
    let date = date(value)?;
    if date > today {
        return Err(invalid("Date of birth cannot be in the future"));
    }
    if date.year() < 1900 {
        return Err(invalid("Date of birth must be after 1900"));
    }
    Ok(date)
}

/// http(s) URL, e.g. a cover image reference
pub fn url(value: &str) -> AppResult<String> {
    let value = value.trim();
    if (value.starts_with("http://") || value.starts_with("https://")) && value.validate_url() {
        Ok(value.to_string())
    } else {
        Err(invalid(format!("Invalid URL: {}", value)))
    }
}

/// Publication year, not after the current year
pub fn year(value: i32, today: NaiveDate) -> AppResult<i32> {
    if value > 0 && value <= today.year() {
        Ok(value)
    } else {
        Err(invalid(format!("Invalid publication year: {}", value)))
    }
}

/// Required free-text field (title, author, publisher...)
pub fn required_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(invalid(format!("{} must be at most {} characters", field, max)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_email() {
        assert_eq!(email("  Jane.Doe@Example.org ").unwrap(), "jane.doe@example.org");
        assert_err!(email("jane.doe@"));
        assert_err!(email("not an email"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(phone("+44 20 7946 0958", "+1").unwrap(), "+442079460958");
        assert_eq!(phone("0044 (20) 7946-0958", "+1").unwrap(), "+442079460958");
        assert_eq!(phone("08031234567", "+234").unwrap(), "+2348031234567");
        assert_err!(phone("12ab", "+1"));
        assert_err!(phone("+1234", "+1"));
    }

    #[test]
    fn test_isbn() {
        assert_eq!(isbn("978-0-306-40615-7").unwrap(), "9780306406157");
        assert_eq!(isbn("0-306-40615-2").unwrap(), "0306406152");
        assert_eq!(isbn("0-8044-2957-x").unwrap(), "080442957X");
        assert_err!(isbn("978-0-306-40615-8"));
        assert_err!(isbn("0-306-40615-3"));
        assert_err!(isbn("12345"));
        assert_err!(isbn("X306406152"));
    }

    #[test]
    fn test_username() {
        assert_ok!(username("reader_01"));
        assert_err!(username("1reader"));
        assert_err!(username("ab"));
        assert_err!(username("has space"));
    }

    #[test]
    fn test_names() {
        assert_eq!(name(" Zoë ").unwrap(), "Zoë");
        assert_ok!(name("O'Brien"));
        assert_ok!(name("Jean-Luc"));
        assert_err!(name("A"));
        assert_err!(name("R2D2"));
        assert_eq!(full_name("Ada   Lovelace").unwrap(), "Ada Lovelace");
        assert_err!(full_name("Ada"));
    }

    #[test]
    fn test_relationship_and_address() {
        assert_eq!(relationship("Older Sister").unwrap(), "older sister");
        assert_err!(relationship("x"));
        assert_ok!(address("12 Library Lane"));
        assert_err!(address("  12 "));
    }

    #[test]
    fn test_password() {
        assert_ok!(password("correct1horse"));
        assert_err!(password("short1"));
        assert_err!(password("lettersonly"));
        assert_err!(password("1234567890"));
    }

    #[test]
    fn test_dates() {
        assert_eq!(date("2024-02-29").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_err!(date("2023-02-29"));
        assert_err!(date("01/02/2024"));
        assert_ok!(birth_date("1990-05-17", today()));
        assert_err!(birth_date("2030-01-01", today()));
        assert_err!(birth_date("1850-01-01", today()));
        assert_eq!(date_filter("borrow_date", None).unwrap(), None);
        assert_eq!(date_filter("borrow_date", Some("")).unwrap(), None);
        assert_err!(date_filter("borrow_date", Some("yesterday")));
    }

    #[test]
    fn test_url_and_year() {
        assert_ok!(url("https://covers.example.org/9780306406157.jpg"));
        assert_err!(url("ftp://covers.example.org/x.jpg"));
        assert_err!(url("not a url"));
        assert_ok!(year(1999, today()));
        assert_err!(year(2025, today()));
        assert_err!(year(0, today()));
    }
}
