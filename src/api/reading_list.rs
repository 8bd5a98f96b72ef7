//! Reading list endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{PaginatedReadingList, PaginatedResponse};
use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        pagination::Page,
        reading_list::{AddToReadingList, ReadingListDetails, ReadingListEntry, ReadingListQuery},
    },
};

/// Add a returned book to a user's reading list
#[utoipa::path(
    post,
    path = "/users/{id}/reading-list",
    tag = "reading-list",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = AddToReadingList,
    responses(
        (status = 201, description = "Book added", body = ReadingListEntry),
        (status = 400, description = "Book was never borrowed by this user", body = ErrorResponse),
        (status = 404, description = "User or book not found", body = ErrorResponse),
        (status = 409, description = "Book not returned yet or already listed", body = ErrorResponse)
    )
)]
pub async fn add_to_reading_list(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
    Json(request): Json<AddToReadingList>,
) -> AppResult<(StatusCode, Json<ReadingListEntry>)> {
    let entry = state.services.reading_list.add(user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// List a user's reading list
#[utoipa::path(
    get,
    path = "/users/{id}/reading-list",
    tag = "reading-list",
    params(
        ("id" = i32, Path, description = "User ID"),
        ReadingListQuery
    ),
    responses(
        (status = 200, description = "Reading list, newest first", body = PaginatedReadingList),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn list_reading_list(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<ReadingListQuery>,
) -> AppResult<Json<PaginatedResponse<ReadingListDetails>>> {
    let page = Page::resolve(query.page, query.per_page, &state.config.pagination)?;
    let (entries, total) = state.services.reading_list.list(user_id, &query, page).await?;
    Ok(Json(PaginatedResponse::new(entries, total, page)))
}

/// Remove a book from a user's reading list
#[utoipa::path(
    delete,
    path = "/users/{id}/reading-list/{book_id}",
    tag = "reading-list",
    params(
        ("id" = i32, Path, description = "User ID"),
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book removed"),
        (status = 404, description = "User or entry not found", body = ErrorResponse)
    )
)]
pub async fn remove_from_reading_list(
    State(state): State<crate::AppState>,
    Path((user_id, book_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    state.services.reading_list.remove(user_id, book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
