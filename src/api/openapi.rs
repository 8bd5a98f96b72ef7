//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, reading_list, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library lending REST API: catalog, patrons, loans, fines and reading lists"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Loans
        loans::borrow_book,
        loans::return_book,
        loans::get_loan,
        loans::return_loan,
        loans::list_loans,
        loans::list_unreturned_loans,
        loans::list_returned_loans,
        loans::list_user_loans,
        loans::list_book_loans,
        loans::list_book_returns,
        // Reading list
        reading_list::add_to_reading_list,
        reading_list::list_reading_list,
        reading_list::remove_from_reading_list,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            super::PaginatedBooks,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            super::PaginatedUsers,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::Borrower,
            crate::models::loan::ReturnBook,
            loans::LoanResponse,
            loans::ReturnLoanRequest,
            super::PaginatedLoans,
            // Reading list
            crate::models::reading_list::ReadingListEntry,
            crate::models::reading_list::ReadingListDetails,
            crate::models::reading_list::AddToReadingList,
            super::PaginatedReadingList,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Borrowing, returns and fines"),
        (name = "reading-list", description = "Personal reading lists")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
