//! Reading lists: books a user has read and wants to keep track of

use super::users::UsersService;
use crate::{
    error::AppResult,
    models::{
        pagination::Page,
        reading_list::{AddToReadingList, ReadingListDetails, ReadingListEntry, ReadingListQuery},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReadingListService {
    repository: Repository,
    users: UsersService,
}

impl ReadingListService {
    pub fn new(repository: Repository, users: UsersService) -> Self {
        Self { repository, users }
    }

    /// Add a returned book to the identified user's reading list
    pub async fn add(&self, user_id: i32, request: &AddToReadingList) -> AppResult<ReadingListEntry> {
        let user = self
            .users
            .identify(user_id, &request.username, &request.email)
            .await?;

        let entry = self.repository.reading_list.add(user.id, request.book_id).await?;
        tracing::info!(user_id = user.id, book_id = request.book_id, "Book added to reading list");
        Ok(entry)
    }

    /// Remove a book from a user's reading list
    pub async fn remove(&self, user_id: i32, book_id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.reading_list.remove(user_id, book_id).await?;
        tracing::info!(user_id, book_id, "Book removed from reading list");
        Ok(())
    }

    /// List a user's reading list
    pub async fn list(
        &self,
        user_id: i32,
        query: &ReadingListQuery,
        page: Page,
    ) -> AppResult<(Vec<ReadingListDetails>, i64)> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.reading_list.search(user_id, query, page).await
    }
}
