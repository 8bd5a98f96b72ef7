//! Reading list repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder, Row};

use super::{books::book_short_from_row, contains_pattern};
use crate::{
    error::{AppError, AppResult},
    models::{
        pagination::Page,
        reading_list::{PairHistory, ReadingListDetails, ReadingListEntry, ReadingListQuery},
    },
};

#[derive(Clone)]
pub struct ReadingListRepository {
    pool: Pool<Postgres>,
}

impl ReadingListRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Add a book to a user's reading list if the loan history admits it
    pub async fn add(&self, user_id: i32, book_id: i32) -> AppResult<ReadingListEntry> {
        let mut tx = self.pool.begin().await?;

        // Borrows hold the book row exclusively; a shared lock keeps a new
        // loan from opening between the history check and the insert.
        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR SHARE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let (loans, outstanding, already_listed): (i64, bool, bool) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM loans WHERE user_id = $1 AND book_id = $2),
                EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL),
                EXISTS(SELECT 1 FROM reading_list WHERE user_id = $1 AND book_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        PairHistory { loans, outstanding, already_listed }.admit()?;

        let entry = sqlx::query_as::<_, ReadingListEntry>(
            r#"
            INSERT INTO reading_list (user_id, book_id)
            VALUES ($1, $2)
            RETURNING id, user_id, book_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "Book already in reading list"))?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Remove a book from a user's reading list
    pub async fn remove(&self, user_id: i32, book_id: i32) -> AppResult<ReadingListEntry> {
        sqlx::query_as::<_, ReadingListEntry>(
            r#"
            DELETE FROM reading_list
            WHERE user_id = $1 AND book_id = $2
            RETURNING id, user_id, book_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found in reading list".to_string()))
    }

    /// List a user's reading list, newest entries first
    pub async fn search(
        &self,
        user_id: i32,
        query: &ReadingListQuery,
        page: Page,
    ) -> AppResult<(Vec<ReadingListDetails>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM reading_list r JOIN books b ON b.id = r.book_id WHERE r.user_id = ",
        );
        count.push_bind(user_id);
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            r#"
            SELECT r.id, r.user_id, r.book_id, r.created_at,
                   b.title, b.author, b.year, b.isbn, b.language, b.category,
                   b.publisher, b.available, b.cover_image_url
            FROM reading_list r
            JOIN books b ON b.id = r.book_id
            WHERE r.user_id =
            "#,
        );
        select.push_bind(user_id);
        push_filters(&mut select, query);
        select
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let entries = rows
            .iter()
            .map(|row| ReadingListDetails {
                id: row.get("id"),
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
                book: book_short_from_row(row),
            })
            .collect();

        Ok((entries, total))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ReadingListQuery) {
    if let Some(book_id) = query.book_id {
        qb.push(" AND r.book_id = ").push_bind(book_id);
    }

    let text_filters = [
        ("b.title", &query.title),
        ("b.author", &query.author),
        ("b.category", &query.category),
        ("b.publisher", &query.publisher),
        ("b.language", &query.language),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            qb.push(format!(" AND {} ILIKE ", column))
                .push_bind(contains_pattern(value));
        }
    }
}
