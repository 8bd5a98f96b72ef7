//! Book (catalog entry) model and the copy-availability tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub year: i32,
    /// Compact ISBN-10 or ISBN-13, unique across the catalog
    pub isbn: String,
    pub language: String,
    pub category: String,
    pub publisher: String,
    pub cover_image_url: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    /// Always equal to `available_copies > 0`
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Re-derive `available` from the copy counter.
    ///
    /// Every write to `available_copies` goes through this.
    pub fn update_availability(&mut self) {
        self.available = self.available_copies > 0;
    }

    /// Take one copy off the shelf for a new loan.
    pub fn check_out(&mut self) -> AppResult<()> {
        if !self.available || self.available_copies <= 0 {
            return Err(AppError::Conflict(format!(
                "Book '{}' is not available",
                self.title
            )));
        }
        self.available_copies -= 1;
        self.update_availability();
        Ok(())
    }

    /// Put one copy back on the shelf after a return.
    ///
    /// Going past `total_copies` means the counters were corrupted somewhere
    /// else; that is reported instead of clamped.
    pub fn check_in(&mut self) -> AppResult<()> {
        if self.available_copies >= self.total_copies {
            return Err(AppError::Internal(format!(
                "Book {} would exceed its total copies ({}/{}) on return",
                self.id, self.available_copies, self.total_copies
            )));
        }
        self.available_copies += 1;
        self.update_availability();
        Ok(())
    }

    /// Change the number of owned copies, shifting the shelf count by the
    /// same delta. Copies currently on loan cannot be removed.
    pub fn set_total_copies(&mut self, total_copies: i32) -> AppResult<()> {
        if total_copies < 0 {
            return Err(AppError::BadRequest(
                "Total copies must be a non-negative integer".to_string(),
            ));
        }
        let on_loan = self.total_copies - self.available_copies;
        if total_copies < on_loan {
            return Err(AppError::Conflict(format!(
                "Cannot reduce total copies to {}: {} copies are on loan",
                total_copies, on_loan
            )));
        }
        self.available_copies = total_copies - on_loan;
        self.total_copies = total_copies;
        self.update_availability();
        Ok(())
    }
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub available: Option<bool>,
    pub language: Option<String>,
    pub category: Option<String>,
    pub publisher: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author must be 1-255 characters"))]
    pub author: String,
    pub year: i32,
    pub isbn: String,
    #[validate(range(min = 0, message = "Total copies must be a non-negative integer"))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0, message = "Available copies must be a non-negative integer"))]
    pub available_copies: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Language must be 1-50 characters"))]
    pub language: String,
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,
    #[validate(length(min = 1, max = 255, message = "Publisher must be 1-255 characters"))]
    pub publisher: String,
    pub cover_image_url: Option<String>,
}

/// Update book request (all fields optional).
///
/// `available` and `available_copies` are not accepted: the shelf count only
/// moves through loans or through a change of `total_copies`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1-255 characters"))]
    pub author: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub total_copies: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Language must be 1-50 characters"))]
    pub language: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Publisher must be 1-255 characters"))]
    pub publisher: Option<String>,
    pub cover_image_url: Option<String>,
}

/// Short book representation embedded in loans and reading lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub isbn: String,
    pub language: String,
    pub category: String,
    pub publisher: String,
    pub available: bool,
    pub cover_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn book(total: i32, available: i32) -> Book {
        let mut book = Book {
            id: 1,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            year: 1965,
            isbn: "9780441172719".to_string(),
            language: "English".to_string(),
            category: "Science Fiction".to_string(),
            publisher: "Chilton".to_string(),
            cover_image_url: None,
            total_copies: total,
            available_copies: available,
            available: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        book.update_availability();
        book
    }

    #[test]
    fn test_update_availability_follows_counter() {
        let mut b = book(2, 0);
        assert!(!b.available);
        b.available_copies = 1;
        b.update_availability();
        assert!(b.available);
        b.update_availability();
        assert!(b.available);
    }

    #[test]
    fn test_check_out_until_empty() {
        let mut b = book(2, 2);
        assert_ok!(b.check_out());
        assert_eq!(b.available_copies, 1);
        assert!(b.available);
        assert_ok!(b.check_out());
        assert_eq!(b.available_copies, 0);
        assert!(!b.available);
        assert!(matches!(b.check_out(), Err(AppError::Conflict(_))));
        assert_eq!(b.available_copies, 0);
    }

    #[test]
    fn test_check_out_then_in_round_trip() {
        let mut b = book(3, 3);
        b.check_out().unwrap();
        b.check_in().unwrap();
        assert_eq!(b.available_copies, 3);
        assert!(b.available);
    }

    #[test]
    fn test_check_in_past_total_is_invariant_violation() {
        let mut b = book(1, 1);
        assert!(matches!(b.check_in(), Err(AppError::Internal(_))));
        assert_eq!(b.available_copies, 1);
    }

    #[test]
    fn test_set_total_copies_keeps_loaned_copies() {
        let mut b = book(3, 1);
        assert_ok!(b.set_total_copies(5));
        assert_eq!((b.total_copies, b.available_copies), (5, 3));

        assert_ok!(b.set_total_copies(2));
        assert_eq!((b.total_copies, b.available_copies), (2, 0));
        assert!(!b.available);

        assert!(matches!(b.set_total_copies(1), Err(AppError::Conflict(_))));
        assert_err!(b.set_total_copies(-1));
    }
}
