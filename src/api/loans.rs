//! Loan endpoints: borrow, return and loan history

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PaginatedLoans, PaginatedResponse};
use crate::{
    error::{AppError, AppResult, ErrorResponse},
    models::{
        book::Book,
        loan::{Borrower, Loan, LoanDetails, LoanQuery, LoanScope, ReturnBook},
        pagination::Page,
    },
    AppState,
};

/// Loan state after a borrow or a return, with the book's updated counters
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    /// Status message
    pub message: String,
    pub loan: Loan,
    pub book: Book,
}

/// Return by loan id
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReturnLoanRequest {
    /// The copy came back damaged
    #[serde(default)]
    pub damage: bool,
}

impl ReturnLoanRequest {
    /// An empty body means an undamaged return; anything else must parse.
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid return request body: {}", e)))
    }
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = Borrower,
    responses(
        (status = 201, description = "Book borrowed", body = LoanResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "User or book not found", body = ErrorResponse),
        (status = 409, description = "Book unavailable or already borrowed by this user", body = ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Json(borrower): Json<Borrower>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let (loan, book) = state.services.loans.borrow(book_id, &borrower).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            message: "Book borrowed successfully".to_string(),
            loan,
            book,
        }),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = ReturnBook,
    responses(
        (status = 200, description = "Book returned, fines assessed", body = LoanResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "User, book or loan not found", body = ErrorResponse),
        (status = 409, description = "Book already returned", body = ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Json(request): Json<ReturnBook>,
) -> AppResult<Json<LoanResponse>> {
    let (loan, book) = state.services.loans.return_book(book_id, &request).await?;
    Ok(Json(LoanResponse {
        message: "Book returned successfully".to_string(),
        loan,
        book,
    }))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = ErrorResponse)
    )
)]
pub async fn get_loan(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Return a loan by its ID
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoanRequest,
    responses(
        (status = 200, description = "Loan returned, fines assessed", body = LoanResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 404, description = "Loan not found", body = ErrorResponse),
        (status = 409, description = "Loan already returned", body = ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<LoanResponse>> {
    let request = ReturnLoanRequest::from_body(&body)?;
    let (loan, book) = state.services.loans.return_loan(id, request.damage).await?;
    Ok(Json(LoanResponse {
        message: "Loan returned successfully".to_string(),
        loan,
        book,
    }))
}

async fn list_scope(
    state: &AppState,
    scope: LoanScope,
    query: &LoanQuery,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let page = Page::resolve(query.page, query.per_page, &state.config.pagination)?;
    let (loans, total) = state.services.loans.list(scope, query, page).await?;
    Ok(Json(PaginatedResponse::new(loans, total, page)))
}

/// List all loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, most recent borrow first", body = PaginatedLoans),
        (status = 400, description = "Invalid filter or paging", body = ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    list_scope(&state, LoanScope::All, &query).await
}

/// List loans not yet returned
#[utoipa::path(
    get,
    path = "/loans/unreturned",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Outstanding loans", body = PaginatedLoans),
        (status = 400, description = "Invalid filter or paging", body = ErrorResponse)
    )
)]
pub async fn list_unreturned_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    list_scope(&state, LoanScope::Outstanding, &query).await
}

/// List returned loans
#[utoipa::path(
    get,
    path = "/loans/returned",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Returned loans", body = PaginatedLoans),
        (status = 400, description = "Invalid filter or paging", body = ErrorResponse)
    )
)]
pub async fn list_returned_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    list_scope(&state, LoanScope::Returned, &query).await
}

/// Loan history of a user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "User ID"),
        LoanQuery
    ),
    responses(
        (status = 200, description = "User's loans", body = PaginatedLoans),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn list_user_loans(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let page = Page::resolve(query.page, query.per_page, &state.config.pagination)?;
    let (loans, total) = state
        .services
        .loans
        .user_loans(user_id, LoanScope::All, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(loans, total, page)))
}

/// Loan history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Book ID"),
        LoanQuery
    ),
    responses(
        (status = 200, description = "Loans of the book", body = PaginatedLoans),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn list_book_loans(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let page = Page::resolve(query.page, query.per_page, &state.config.pagination)?;
    let (loans, total) = state
        .services
        .loans
        .book_loans(book_id, LoanScope::All, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(loans, total, page)))
}

/// Returned loans of a book
#[utoipa::path(
    get,
    path = "/books/{id}/returns",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Book ID"),
        LoanQuery
    ),
    responses(
        (status = 200, description = "Returns of the book", body = PaginatedLoans),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn list_book_returns(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let page = Page::resolve(query.page, query.per_page, &state.config.pagination)?;
    let (loans, total) = state
        .services
        .loans
        .book_loans(book_id, LoanScope::Returned, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(loans, total, page)))
}
