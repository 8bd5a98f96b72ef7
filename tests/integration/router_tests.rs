//! In-process router tests for requests rejected before any database access

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use libris_server::{api, config::AppConfig, repository::Repository, services::Services, AppState};

fn app() -> Router {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy(&config.database.url)
        .expect("valid database url");
    let services = Services::new(Repository::new(pool), &config);
    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn registration() -> Value {
    json!({
        "username": "reader01",
        "password": "s3cretpass",
        "email": "reader01@example.org",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "phone_number": "+15551234567",
        "date_of_birth": "1990-12-10",
        "address": "12 Analytical Row",
        "guarantor_fullname": "Charles Babbage",
        "guarantor_phone_number": "+15557654321",
        "guarantor_address": "1 Engine Street",
        "guarantor_relationship": "mentor"
    })
}

fn new_book() -> Value {
    json!({
        "title": "Dune",
        "author": "Frank Herbert",
        "year": 1965,
        "isbn": "9780441172719",
        "total_copies": 2,
        "language": "English",
        "category": "Science Fiction",
        "publisher": "Chilton"
    })
}

#[tokio::test]
async fn test_health_is_static() {
    let (status, body) = send(get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_registration_rejects_bad_email() {
    let mut user = registration();
    user["email"] = json!("not-an-email");
    let (status, body) = send(json_request(Method::POST, "/api/v1/users", user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_registration_rejects_weak_password() {
    let mut user = registration();
    user["password"] = json!("onlyletters");
    let (status, _) = send(json_request(Method::POST, "/api/v1/users", user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registration_rejects_guarantor_with_same_phone() {
    let mut user = registration();
    user["guarantor_phone_number"] = json!("+1 555 123 4567");
    let (status, body) = send(json_request(Method::POST, "/api/v1/users", user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("guarantor"));
}

#[tokio::test]
async fn test_create_book_rejects_bad_isbn_checksum() {
    let mut book = new_book();
    book["isbn"] = json!("9780441172710");
    let (status, body) = send(json_request(Method::POST, "/api/v1/books", book)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("ISBN"));
}

#[tokio::test]
async fn test_create_book_rejects_more_available_than_total() {
    let mut book = new_book();
    book["available_copies"] = json!(3);
    let (status, _) = send(json_request(Method::POST, "/api/v1/books", book)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_book_refuses_availability_fields() {
    let (status, _) = send(json_request(
        Method::PUT,
        "/api/v1/books/1",
        json!({ "available": true }),
    ))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_listing_rejects_page_zero() {
    let (status, body) = send(get("/api/v1/loans?page=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_loan_listing_rejects_malformed_date_filter() {
    let (status, body) = send(get("/api/v1/loans/returned?borrow_date=2024-13-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("borrow_date"));

    let (status, _) = send(get("/api/v1/users/1/loans?due_date=yesterday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_borrow_rejects_malformed_email() {
    let (status, _) = send(json_request(
        Method::POST,
        "/api/v1/books/1/borrow",
        json!({ "user_id": 1, "username": "reader01", "email": "reader01" }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_id_is_rejected() {
    let (status, _) = send(get("/api/v1/books/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_by_id_rejects_mistyped_damage_flag() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/v1/loans/1/return",
        json!({ "damage": "yes" }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_return_by_id_rejects_truncated_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/loans/1/return")
        .body(Body::from(r#"{"damage": tru"#))
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_listing_rejects_page_past_offset_range() {
    let (status, body) = send(get("/api/v1/books?page=9223372036854775807")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let (status, body) = send(get("/api/v1/no-such-thing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchData");
    assert!(body["message"].as_str().unwrap().contains("/api/v1/no-such-thing"));
}
