//! Books repository for database operations

use chrono::Utc;
use sqlx::{postgres::PgRow, PgConnection, Pool, Postgres, QueryBuilder, Row};

use super::contains_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookShort, UpdateBook},
        pagination::Page,
    },
};

const BOOK_COLUMNS: &str = "id, title, author, year, isbn, language, category, publisher, \
     cover_image_url, total_copies, available_copies, available, created_at, updated_at";

const DUPLICATE_ISBN: &str = "A book with this ISBN already exists";

/// Map the book columns of a joined row (`book_id`, `title`, ...) to a [`BookShort`]
pub(crate) fn book_short_from_row(row: &PgRow) -> BookShort {
    BookShort {
        id: row.get("book_id"),
        title: row.get("title"),
        author: row.get("author"),
        year: row.get("year"),
        isbn: row.get("isbn"),
        language: row.get("language"),
        category: row.get("category"),
        publisher: row.get("publisher"),
        available: row.get("available"),
        cover_image_url: row.get("cover_image_url"),
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Fetch a book and hold its row lock until the surrounding transaction ends.
    ///
    /// Every operation that changes the copy counters takes this lock first,
    /// which serializes borrows and returns of the same book.
    pub(crate) async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1 FOR UPDATE",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Persist the copy counters of a locked book
    pub(crate) async fn save_copies(conn: &mut PgConnection, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET total_copies = $1, available_copies = $2, available = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.available)
        .bind(Utc::now())
        .bind(book.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Check if ISBN already exists
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::INTEGER IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a new book; `book.id` and timestamps are assigned by the database
    pub async fn create(&self, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, year, isbn, language, category, publisher,
                               cover_image_url, total_copies, available_copies, available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(&book.isbn)
        .bind(&book.language)
        .bind(&book.category)
        .bind(&book.publisher)
        .bind(&book.cover_image_url)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.available)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_ISBN))
    }

    /// Apply a (validated) partial update under the book's row lock
    pub async fn update(&self, id: i32, changes: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let mut book = Self::lock(&mut tx, id).await?;

        if let Some(ref title) = changes.title {
            book.title = title.clone();
        }
        if let Some(ref author) = changes.author {
            book.author = author.clone();
        }
        if let Some(year) = changes.year {
            book.year = year;
        }
        if let Some(ref isbn) = changes.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(ref language) = changes.language {
            book.language = language.clone();
        }
        if let Some(ref category) = changes.category {
            book.category = category.clone();
        }
        if let Some(ref publisher) = changes.publisher {
            book.publisher = publisher.clone();
        }
        if let Some(ref url) = changes.cover_image_url {
            book.cover_image_url = Some(url.clone());
        }
        if let Some(total_copies) = changes.total_copies {
            book.set_total_copies(total_copies)?;
        }

        let updated = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $1, author = $2, year = $3, isbn = $4, language = $5, category = $6,
                publisher = $7, cover_image_url = $8, total_copies = $9,
                available_copies = $10, available = $11, updated_at = $12
            WHERE id = $13
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(&book.isbn)
        .bind(&book.language)
        .bind(&book.category)
        .bind(&book.publisher)
        .bind(&book.cover_image_url)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.available)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_ISBN))?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery, page: Page) -> AppResult<(Vec<Book>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books WHERE 1=1");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books WHERE 1=1", BOOK_COLUMNS));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Delete a book.
    ///
    /// Refused while a copy is on loan. Returned-loan history blocks the
    /// delete unless `force` is set, in which case it is removed as well.
    /// Returns the number of history rows removed.
    pub async fn delete(&self, id: i32, force: bool) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        Self::lock(&mut tx, id).await?;

        let (loans, outstanding): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE return_date IS NULL) FROM loans WHERE book_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding > 0 {
            return Err(AppError::Conflict(format!(
                "Book has {} copies on loan",
                outstanding
            )));
        }
        if loans > 0 && !force {
            return Err(AppError::Conflict(
                "Book has loan history; use force=true to delete it with its history".to_string(),
            ));
        }

        let removed = sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    if let Some(ref title) = query.title {
        qb.push(" AND title ILIKE ").push_bind(contains_pattern(title));
    }
    if let Some(ref author) = query.author {
        qb.push(" AND author ILIKE ").push_bind(contains_pattern(author));
    }
    if let Some(year) = query.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(ref isbn) = query.isbn {
        qb.push(" AND isbn = ").push_bind(isbn.clone());
    }
    if let Some(available) = query.available {
        qb.push(" AND available = ").push_bind(available);
    }
    if let Some(ref language) = query.language {
        qb.push(" AND language ILIKE ").push_bind(contains_pattern(language));
    }
    if let Some(ref category) = query.category {
        qb.push(" AND category ILIKE ").push_bind(contains_pattern(category));
    }
    if let Some(ref publisher) = query.publisher {
        qb.push(" AND publisher ILIKE ").push_bind(contains_pattern(publisher));
    }
}
