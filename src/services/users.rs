//! User registration, profile management and borrower identification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::ValidationConfig,
    error::{AppError, AppResult},
    models::{
        pagination::Page,
        user::{CreateUser, NewUser, UpdateUser, User, UserQuery, UserShort},
    },
    repository::Repository,
    validation,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: ValidationConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: ValidationConfig) -> Self {
        Self { repository, config }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Search users
    pub async fn search_users(&self, query: &UserQuery, page: Page) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query, page).await
    }

    /// Resolve the user designated by an id, a username and an email.
    ///
    /// Loan and reading-list requests carry all three; they must agree.
    pub async fn identify(&self, user_id: i32, username: &str, email: &str) -> AppResult<User> {
        let email = validation::email(email)?;
        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.matches_identity(username, &email) {
            return Err(AppError::NotFound(
                "User not found: id, username and email do not match".to_string(),
            ));
        }
        Ok(user)
    }

    /// Register a new user
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;
        let today = Utc::now().date_naive();
        let cc = &self.config.default_country_code;

        validation::password(&user.password)?;
        let new_user = NewUser {
            username: validation::username(&user.username)?,
            email: validation::email(&user.email)?,
            password_hash: hash_password(&user.password)?,
            first_name: validation::name(&user.first_name)?,
            last_name: validation::name(&user.last_name)?,
            phone_number: validation::phone(&user.phone_number, cc)?,
            date_of_birth: validation::birth_date(&user.date_of_birth, today)?,
            address: validation::address(&user.address)?,
            guarantor_fullname: validation::full_name(&user.guarantor_fullname)?,
            guarantor_phone_number: validation::phone(&user.guarantor_phone_number, cc)?,
            guarantor_address: validation::address(&user.guarantor_address)?,
            guarantor_relationship: validation::relationship(&user.guarantor_relationship)?,
        };

        check_guarantor_phone(&new_user.phone_number, &new_user.guarantor_phone_number)?;

        if self.repository.users.username_exists(&new_user.username, None).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.repository.users.email_exists(&new_user.email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let created = self.repository.users.create(&new_user).await?;
        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Update a user's profile.
    ///
    /// Supplying a value equal to the stored one is a conflict. A password
    /// change needs both `old_password` and `new_password`.
    pub async fn update_user(&self, id: i32, changes: UpdateUser) -> AppResult<User> {
        changes.validate()?;
        let cc = &self.config.default_country_code;
        let mut user = self.repository.users.get_by_id(id).await?;
        let mut changed = false;

        if let Some(ref username) = changes.username {
            let username = validation::username(username)?;
            // Uniqueness ignores case but excludes this user, so a case-only rename is allowed
            if self.repository.users.username_exists(&username, Some(id)).await? {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
            replace_field("username", username, &mut user.username)?;
            changed = true;
        }

        if let Some(ref email) = changes.email {
            let email = validation::email(email)?;
            if self.repository.users.email_exists(&email, Some(id)).await? {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            replace_field("email", email, &mut user.email)?;
            changed = true;
        }

        match (changes.old_password.as_deref(), changes.new_password.as_deref()) {
            (None, None) => {}
            (Some(old), Some(new)) => {
                if !verify_password(&user.password, old)? {
                    return Err(AppError::BadRequest("Old password is incorrect".to_string()));
                }
                validation::password(new)?;
                if verify_password(&user.password, new)? {
                    return Err(unchanged("password"));
                }
                user.password = hash_password(new)?;
                changed = true;
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Both old_password and new_password are required to change the password".to_string(),
                ))
            }
        }

        let fields = [
            ("first_name", changes.first_name.as_deref().map(validation::name).transpose()?, &mut user.first_name),
            ("last_name", changes.last_name.as_deref().map(validation::name).transpose()?, &mut user.last_name),
            (
                "phone_number",
                changes.phone_number.as_deref().map(|p| validation::phone(p, cc)).transpose()?,
                &mut user.phone_number,
            ),
            ("address", changes.address.as_deref().map(validation::address).transpose()?, &mut user.address),
            (
                "guarantor_fullname",
                changes.guarantor_fullname.as_deref().map(validation::full_name).transpose()?,
                &mut user.guarantor_fullname,
            ),
            (
                "guarantor_phone_number",
                changes
                    .guarantor_phone_number
                    .as_deref()
                    .map(|p| validation::phone(p, cc))
                    .transpose()?,
                &mut user.guarantor_phone_number,
            ),
            (
                "guarantor_address",
                changes.guarantor_address.as_deref().map(validation::address).transpose()?,
                &mut user.guarantor_address,
            ),
            (
                "guarantor_relationship",
                changes
                    .guarantor_relationship
                    .as_deref()
                    .map(validation::relationship)
                    .transpose()?,
                &mut user.guarantor_relationship,
            ),
        ];
        for (field, value, current) in fields {
            if let Some(value) = value {
                replace_field(field, value, current)?;
                changed = true;
            }
        }

        if !changed {
            return Ok(user);
        }

        check_guarantor_phone(&user.phone_number, &user.guarantor_phone_number)?;

        let updated = self.repository.users.update(&user).await?;
        tracing::info!(user_id = updated.id, "User updated");
        Ok(updated)
    }

    /// Delete a user account
    pub async fn delete_user(&self, id: i32, force: bool) -> AppResult<()> {
        let removed_history = self.repository.users.delete(id, force).await?;
        if removed_history > 0 {
            tracing::warn!(user_id = id, removed_loans = removed_history, "User deleted with its loan history");
        } else {
            tracing::info!(user_id = id, "User deleted");
        }
        Ok(())
    }
}

fn unchanged(field: &str) -> AppError {
    AppError::Conflict(format!("New {} is the same as the current one", field))
}

/// Store a normalized value, refusing one identical to the stored value
fn replace_field(field: &str, value: String, current: &mut String) -> AppResult<()> {
    if value == *current {
        return Err(unchanged(field));
    }
    *current = value;
    Ok(())
}

fn check_guarantor_phone(phone: &str, guarantor_phone: &str) -> AppResult<()> {
    if phone == guarantor_phone {
        return Err(AppError::BadRequest(
            "Phone number and guarantor phone number must be different".to_string(),
        ));
    }
    Ok(())
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
