//! Loan lifecycle: borrowing, returning, fines and loan history

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use super::users::UsersService;
use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{Borrower, Loan, LoanDetails, LoanFilter, LoanPolicy, LoanQuery, LoanScope, ReturnBook},
        pagination::Page,
    },
    repository::Repository,
    validation,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    users: UsersService,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(repository: Repository, users: UsersService, policy: LoanPolicy) -> Self {
        Self { repository, users, policy }
    }

    /// Get loan by ID
    pub async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    /// Borrow one copy of a book
    pub async fn borrow(&self, book_id: i32, borrower: &Borrower) -> AppResult<(Loan, Book)> {
        let user = self
            .users
            .identify(borrower.user_id, &borrower.username, &borrower.email)
            .await?;

        let (loan, book) = self
            .repository
            .loans
            .borrow(user.id, book_id, &self.policy, Utc::now())
            .await?;

        tracing::info!(
            loan_id = loan.id,
            user_id = user.id,
            book_id,
            due_date = %loan.due_date,
            available_copies = book.available_copies,
            "Book borrowed"
        );
        Ok((loan, book))
    }

    /// Return the copy of `book_id` the identified user holds
    pub async fn return_book(&self, book_id: i32, request: &ReturnBook) -> AppResult<(Loan, Book)> {
        let user = self
            .users
            .identify(request.user_id, &request.username, &request.email)
            .await?;

        let (loan, book) = self
            .repository
            .loans
            .return_outstanding(user.id, book_id, request.damage, &self.policy, Utc::now())
            .await?;

        log_return(&loan, &book);
        Ok((loan, book))
    }

    /// Return a loan designated by its id
    pub async fn return_loan(&self, loan_id: i32, damaged: bool) -> AppResult<(Loan, Book)> {
        let (loan, book) = self
            .repository
            .loans
            .return_by_id(loan_id, damaged, &self.policy, Utc::now())
            .await?;

        log_return(&loan, &book);
        Ok((loan, book))
    }

    /// List loans in `scope` matching `query`
    pub async fn list(&self, scope: LoanScope, query: &LoanQuery, page: Page) -> AppResult<(Vec<LoanDetails>, i64)> {
        let filter = resolve_filter(query)?;
        self.repository.loans.search(scope, &filter, page, Utc::now()).await
    }

    /// Loan history of one user
    pub async fn user_loans(
        &self,
        user_id: i32,
        scope: LoanScope,
        query: &LoanQuery,
        page: Page,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let mut filter = resolve_filter(query)?;
        self.repository.users.get_by_id(user_id).await?;
        filter.user_id = Some(user_id);
        self.repository.loans.search(scope, &filter, page, Utc::now()).await
    }

    /// Loan history of one book
    pub async fn book_loans(
        &self,
        book_id: i32,
        scope: LoanScope,
        query: &LoanQuery,
        page: Page,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let mut filter = resolve_filter(query)?;
        self.repository.books.get_by_id(book_id).await?;
        filter.book_id = Some(book_id);
        self.repository.loans.search(scope, &filter, page, Utc::now()).await
    }
}

fn log_return(loan: &Loan, book: &Book) {
    tracing::info!(
        loan_id = loan.id,
        user_id = loan.user_id,
        book_id = book.id,
        damage = loan.damage,
        fine_amount = loan.fine_amount,
        damage_fine = loan.damage_fine,
        total_fine = loan.total_fine,
        available_copies = book.available_copies,
        "Book returned"
    );
}

/// Validate the raw query parameters into repository filters
fn resolve_filter(query: &LoanQuery) -> AppResult<LoanFilter> {
    let from = |field: &str, value: &Option<String>| {
        validation::date_filter(field, value.as_deref()).map(|d| d.map(start_of_day))
    };

    Ok(LoanFilter {
        user_id: query.user_id,
        book_id: query.book_id,
        borrow_from: from("borrow_date", &query.borrow_date)?,
        due_from: from("due_date", &query.due_date)?,
        returned_from: from("return_date", &query.return_date)?,
        title: query.title.clone(),
        author: query.author.clone(),
        category: query.category.clone(),
        publisher: query.publisher.clone(),
        language: query.language.clone(),
    })
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
