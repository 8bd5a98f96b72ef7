//! Loan (borrow) model, fine policy and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;

/// Lending rules: loan period and fine amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPolicy {
    pub loan_period_days: i64,
    pub fine_per_week: i64,
    pub fine_on_damage: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            fine_per_week: 500,
            fine_on_damage: 1000,
        }
    }
}

/// Fines recorded on a loan when it is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Fines {
    pub fine_amount: i64,
    pub damage_fine: i64,
    pub total_fine: i64,
}

impl LoanPolicy {
    pub fn due_date(&self, borrow_date: DateTime<Utc>) -> DateTime<Utc> {
        borrow_date + Duration::days(self.loan_period_days)
    }

    /// Fines for a return at `return_date`.
    ///
    /// Lateness counts whole days past `due_date`, and only whole weeks of
    /// lateness are charged: 1-6 days late costs nothing, 7-13 days one week.
    pub fn assess(&self, due_date: DateTime<Utc>, return_date: DateTime<Utc>, damaged: bool) -> Fines {
        let days_late = (return_date - due_date).num_days().max(0);
        let weeks_late = days_late / 7;
        let fine_amount = weeks_late * self.fine_per_week;
        let damage_fine = if damaged { self.fine_on_damage } else { 0 };
        Fines {
            fine_amount,
            damage_fine,
            total_fine: fine_amount + damage_fine,
        }
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub damage: bool,
    pub fine_amount: i64,
    pub damage_fine: i64,
    pub total_fine: i64,
}

impl Loan {
    pub fn is_outstanding(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_outstanding() && self.due_date < now
    }

    /// Record the return: stamps `return_date` and the fines.
    ///
    /// A loan is closed exactly once; afterwards it is history.
    pub fn close(&mut self, return_date: DateTime<Utc>, damaged: bool, policy: &LoanPolicy) -> Fines {
        let fines = policy.assess(self.due_date, return_date, damaged);
        self.return_date = Some(return_date);
        self.damage = damaged;
        self.fine_amount = fines.fine_amount;
        self.damage_fine = fines.damage_fine;
        self.total_fine = fines.total_fine;
        fines
    }
}

/// Loan joined with its book for listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub damage: bool,
    pub fine_amount: i64,
    pub damage_fine: i64,
    pub total_fine: i64,
    pub is_overdue: bool,
    pub book: BookShort,
}

/// Which part of the loan history a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanScope {
    All,
    Outstanding,
    Returned,
}

/// Loan listing filters. Dates are `YYYY-MM-DD` lower bounds.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub borrow_date: Option<String>,
    pub due_date: Option<String>,
    pub return_date: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Resolved loan filters. Each `*_from` is an inclusive lower bound.
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub borrow_from: Option<DateTime<Utc>>,
    pub due_from: Option<DateTime<Utc>>,
    pub returned_from: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
}

/// Borrower identification: all three must designate the same user
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Borrower {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

/// Return request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBook {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub damage: bool,
}
