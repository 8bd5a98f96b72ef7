//! Reading list model and admission rule

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReadingListEntry {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Reading list entry joined with its book
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadingListDetails {
    pub id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub book: BookShort,
}

/// Loan history of one (user, book) pair, as seen by the admission rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairHistory {
    pub loans: i64,
    pub outstanding: bool,
    pub already_listed: bool,
}

impl PairHistory {
    /// A book is admitted once it has been borrowed and every loan of it by
    /// this user has been returned.
    pub fn admit(&self) -> AppResult<()> {
        if self.loans == 0 {
            return Err(AppError::BadRequest(
                "You never borrowed this book, so it cannot be added to the reading list".to_string(),
            ));
        }
        if self.outstanding {
            return Err(AppError::Conflict(
                "You must return the book before adding it to your reading list".to_string(),
            ));
        }
        if self.already_listed {
            return Err(AppError::Conflict("Book already in reading list".to_string()));
        }
        Ok(())
    }
}

/// Add to reading list request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddToReadingList {
    pub book_id: i32,
    pub username: String,
    pub email: String,
}

/// Reading list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReadingListQuery {
    pub book_id: Option<i32>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
