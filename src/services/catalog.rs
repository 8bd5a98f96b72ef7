//! Catalog management service

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        pagination::Page,
    },
    repository::Repository,
    validation,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Search books
    pub async fn search_books(&self, mut query: BookQuery, page: Page) -> AppResult<(Vec<Book>, i64)> {
        query.isbn = query.isbn.as_deref().map(validation::isbn).transpose()?;
        self.repository.books.search(&query, page).await
    }

    /// Add a book to the catalog
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let today = Utc::now().date_naive();

        let isbn = validation::isbn(&book.isbn)?;
        let year = validation::year(book.year, today)?;
        let cover_image_url = book
            .cover_image_url
            .as_deref()
            .map(validation::url)
            .transpose()?;

        let available_copies = book.available_copies.unwrap_or(book.total_copies);
        if available_copies > book.total_copies {
            return Err(AppError::BadRequest(
                "Total copies must be greater than or equal to available copies".to_string(),
            ));
        }

        if self.repository.books.isbn_exists(&isbn, None).await? {
            return Err(AppError::Conflict("A book with this ISBN already exists".to_string()));
        }

        let now = Utc::now();
        let mut new_book = Book {
            id: 0,
            title: validation::required_text("Title", &book.title, 255)?,
            author: validation::required_text("Author", &book.author, 255)?,
            year,
            isbn,
            language: validation::required_text("Language", &book.language, 50)?,
            category: validation::required_text("Category", &book.category, 100)?,
            publisher: validation::required_text("Publisher", &book.publisher, 255)?,
            cover_image_url,
            total_copies: book.total_copies,
            available_copies,
            available: false,
            created_at: now,
            updated_at: None,
        };
        new_book.update_availability();

        let created = self.repository.books.create(&new_book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, copies = created.total_copies, "Book added to catalog");
        Ok(created)
    }

    /// Update an existing book
    pub async fn update_book(&self, id: i32, changes: UpdateBook) -> AppResult<Book> {
        changes.validate()?;
        let today = Utc::now().date_naive();

        let isbn = changes.isbn.as_deref().map(validation::isbn).transpose()?;
        if let Some(ref isbn) = isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict("A book with this ISBN already exists".to_string()));
            }
        }

        let changes = UpdateBook {
            title: text(changes.title, "Title", 255)?,
            author: text(changes.author, "Author", 255)?,
            year: changes.year.map(|y| validation::year(y, today)).transpose()?,
            isbn,
            total_copies: changes.total_copies,
            language: text(changes.language, "Language", 50)?,
            category: text(changes.category, "Category", 100)?,
            publisher: text(changes.publisher, "Publisher", 255)?,
            cover_image_url: changes
                .cover_image_url
                .as_deref()
                .map(validation::url)
                .transpose()?,
        };

        let updated = self.repository.books.update(id, &changes).await?;
        tracing::info!(
            book_id = updated.id,
            total_copies = updated.total_copies,
            available_copies = updated.available_copies,
            "Book updated"
        );
        Ok(updated)
    }

    /// Remove a book from the catalog
    pub async fn delete_book(&self, id: i32, force: bool) -> AppResult<()> {
        let removed_history = self.repository.books.delete(id, force).await?;
        if removed_history > 0 {
            tracing::warn!(book_id = id, removed_loans = removed_history, "Book deleted with its loan history");
        } else {
            tracing::info!(book_id = id, "Book deleted");
        }
        Ok(())
    }
}

fn text(value: Option<String>, field: &str, max: usize) -> AppResult<Option<String>> {
    value.map(|v| validation::required_text(field, &v, max)).transpose()
}
