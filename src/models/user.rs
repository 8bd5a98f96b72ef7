//! User (patron) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub guarantor_fullname: String,
    pub guarantor_phone_number: String,
    pub guarantor_address: String,
    pub guarantor_relationship: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether `username` and `email` designate this user
    pub fn matches_identity(&self, username: &str, email: &str) -> bool {
        self.username.eq_ignore_ascii_case(username.trim())
            && self.email.eq_ignore_ascii_case(email.trim())
    }
}

/// Short user representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub username: Option<String>,
    pub email: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub address: String,
    pub guarantor_fullname: String,
    pub guarantor_phone_number: String,
    pub guarantor_address: String,
    pub guarantor_relationship: String,
}

/// Update user request (all fields optional)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    pub username: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    /// Current password, required to set `new_password`
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub guarantor_fullname: Option<String>,
    pub guarantor_phone_number: Option<String>,
    pub guarantor_address: Option<String>,
    pub guarantor_relationship: Option<String>,
}

/// Normalized registration, ready to persist
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub guarantor_fullname: String,
    pub guarantor_phone_number: String,
    pub guarantor_address: String,
    pub guarantor_relationship: String,
}

/// Delete options shared by users and books
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteParams {
    /// Also remove returned-loan history and reading-list entries
    pub force: Option<bool>,
}
