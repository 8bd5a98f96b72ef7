//! Loans repository: borrow/return transactions and loan history queries

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Pool, Postgres, QueryBuilder};

use super::{
    books::{book_short_from_row, BooksRepository},
    contains_pattern,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{Loan, LoanDetails, LoanFilter, LoanPolicy, LoanScope},
        pagination::Page,
    },
};

const LOAN_COLUMNS: &str =
    "id, user_id, book_id, borrow_date, due_date, return_date, damage, fine_amount, damage_fine, total_fine";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Open a loan of `book_id` for `user_id`.
    ///
    /// The book row stays locked from the availability check until commit, so
    /// two borrowers can never take the same last copy and a user cannot open
    /// a second loan of a book they still hold.
    pub async fn borrow(
        &self,
        user_id: i32,
        book_id: i32,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;

        // Shared lock: the account cannot be deleted while the loan is opened
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

        let mut book = BooksRepository::lock(&mut tx, book_id).await?;
        book.check_out()?;

        let already_borrowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL)",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_borrowed {
            return Err(AppError::Conflict(
                "You already borrowed this book and have not returned it".to_string(),
            ));
        }

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (user_id, book_id, borrow_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(policy.due_date(now))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, "You already borrowed this book and have not returned it")
        })?;

        BooksRepository::save_copies(&mut tx, &book).await?;
        tx.commit().await?;

        Ok((loan, book))
    }

    /// Close the outstanding loan of `book_id` held by `user_id`
    pub async fn return_outstanding(
        &self,
        user_id: i32,
        book_id: i32,
        damaged: bool,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;
        let book = BooksRepository::lock(&mut tx, book_id).await?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(loan) = loan else {
            let ever_borrowed: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2)",
            )
            .bind(user_id)
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;

            return Err(if ever_borrowed {
                AppError::Conflict("Book already returned".to_string())
            } else {
                AppError::NotFound(format!(
                    "No loan of book {} by user {}",
                    book_id, user_id
                ))
            });
        };

        let closed = Self::close(&mut tx, loan, book, damaged, policy, now).await?;
        tx.commit().await?;
        Ok(closed)
    }

    /// Close a loan designated by its id
    pub async fn return_by_id(
        &self,
        loan_id: i32,
        damaged: bool,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<(Loan, Book)> {
        // Lock order is book then loan, same as every other counter update
        let book_id: i32 = sqlx::query_scalar("SELECT book_id FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        let mut tx = self.pool.begin().await?;
        let book = BooksRepository::lock(&mut tx, book_id).await?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        if !loan.is_outstanding() {
            return Err(AppError::Conflict("Loan already returned".to_string()));
        }

        let closed = Self::close(&mut tx, loan, book, damaged, policy, now).await?;
        tx.commit().await?;
        Ok(closed)
    }

    /// Stamp return date and fines on a locked loan and shelve the copy
    async fn close(
        conn: &mut PgConnection,
        mut loan: Loan,
        mut book: Book,
        damaged: bool,
        policy: &LoanPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<(Loan, Book)> {
        loan.close(now, damaged, policy);
        book.check_in()?;

        let updated = sqlx::query(
            r#"
            UPDATE loans
            SET return_date = $1, damage = $2, fine_amount = $3, damage_fine = $4, total_fine = $5
            WHERE id = $6 AND return_date IS NULL
            "#,
        )
        .bind(loan.return_date)
        .bind(loan.damage)
        .bind(loan.fine_amount)
        .bind(loan.damage_fine)
        .bind(loan.total_fine)
        .bind(loan.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated != 1 {
            return Err(AppError::Conflict("Loan already returned".to_string()));
        }

        BooksRepository::save_copies(conn, &book).await?;
        Ok((loan, book))
    }

    /// List loans joined with their book, most recent borrow first
    pub async fn search(
        &self,
        scope: LoanScope,
        filter: &LoanFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM loans l JOIN books b ON b.id = l.book_id WHERE 1=1",
        );
        push_filters(&mut count, scope, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            r#"
            SELECT l.id, l.user_id, l.book_id, l.borrow_date, l.due_date, l.return_date,
                   l.damage, l.fine_amount, l.damage_fine, l.total_fine,
                   b.title, b.author, b.year, b.isbn, b.language, b.category,
                   b.publisher, b.available, b.cover_image_url
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE 1=1
            "#,
        );
        push_filters(&mut select, scope, filter);
        select
            .push(" ORDER BY l.borrow_date DESC, l.id DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build().fetch_all(&self.pool).await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let loan = Loan::from_row(&row)?;
            result.push(LoanDetails {
                id: loan.id,
                user_id: loan.user_id,
                borrow_date: loan.borrow_date,
                due_date: loan.due_date,
                return_date: loan.return_date,
                damage: loan.damage,
                fine_amount: loan.fine_amount,
                damage_fine: loan.damage_fine,
                total_fine: loan.total_fine,
                is_overdue: loan.is_overdue(now),
                book: book_short_from_row(&row),
            });
        }

        Ok((result, total))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: LoanScope, filter: &LoanFilter) {
    match scope {
        LoanScope::All => {}
        LoanScope::Outstanding => {
            qb.push(" AND l.return_date IS NULL");
        }
        LoanScope::Returned => {
            qb.push(" AND l.return_date IS NOT NULL");
        }
    }

    if let Some(user_id) = filter.user_id {
        qb.push(" AND l.user_id = ").push_bind(user_id);
    }
    if let Some(book_id) = filter.book_id {
        qb.push(" AND l.book_id = ").push_bind(book_id);
    }
    if let Some(from) = filter.borrow_from {
        qb.push(" AND l.borrow_date >= ").push_bind(from);
    }
    if let Some(from) = filter.due_from {
        qb.push(" AND l.due_date >= ").push_bind(from);
    }
    if let Some(from) = filter.returned_from {
        qb.push(" AND l.return_date >= ").push_bind(from);
    }

    let text_filters = [
        ("b.title", &filter.title),
        ("b.author", &filter.author),
        ("b.category", &filter.category),
        ("b.publisher", &filter.publisher),
        ("b.language", &filter.language),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            qb.push(format!(" AND {} ILIKE ", column))
                .push_bind(contains_pattern(value));
        }
    }
}
