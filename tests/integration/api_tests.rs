//! End-to-end API tests against a running server and database.
//!
//! Run with: cargo test -- --ignored

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Per-run suffix so tests can be re-run against the same database
fn unique() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    (nanos % 1_000_000_000) as u64
}

/// ISBN-13 with a correct check digit built from a 9-digit serial
fn isbn13(serial: u64) -> String {
    let body = format!("978{:09}", serial % 1_000_000_000);
    let sum: u32 = body
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let d = c.to_digit(10).unwrap();
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    format!("{}{}", body, (10 - sum % 10) % 10)
}

async fn register(client: &Client, tag: &str) -> Value {
    let n = unique();
    let response = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "username": format!("{}{}", tag, n),
            "password": "s3cretpass",
            "email": format!("{}{}@example.org", tag, n),
            "first_name": "Ada",
            "last_name": "Lovelace",
            "phone_number": "+15551234567",
            "date_of_birth": "1990-12-10",
            "address": "12 Analytical Row",
            "guarantor_fullname": "Charles Babbage",
            "guarantor_phone_number": "+15557654321",
            "guarantor_address": "1 Engine Street",
            "guarantor_relationship": "mentor"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse response")
}

async fn add_book(client: &Client, copies: i32) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "year": 1969,
            "isbn": isbn13(unique()),
            "total_copies": copies,
            "language": "English",
            "category": "Science Fiction",
            "publisher": "Ace Books"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse response")
}

fn identity(user: &Value) -> Value {
    json!({
        "user_id": user["id"],
        "username": user["username"],
        "email": user["email"]
    })
}

async fn borrow(client: &Client, book: &Value, user: &Value) -> reqwest::Response {
    client
        .post(format!("{}/books/{}/borrow", BASE_URL, book["id"]))
        .json(&identity(user))
        .send()
        .await
        .expect("Failed to send request")
}

async fn return_loan(client: &Client, loan_id: &Value, body: Option<Value>) -> reqwest::Response {
    let request = client.post(format!("{}/loans/{}/return", BASE_URL, loan_id));
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };
    request.send().await.expect("Failed to send request")
}

async fn return_book(client: &Client, book: &Value, user: &Value, damage: bool) -> reqwest::Response {
    let mut body = identity(user);
    body["damage"] = json!(damage);
    client
        .post(format!("{}/books/{}/return", BASE_URL, book["id"]))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_and_reading_list() {
    let client = Client::new();
    let user = register(&client, "reader").await;
    let book = add_book(&client, 1).await;
    assert_eq!(book["available"], true);

    // Never borrowed: not eligible for the reading list
    let response = client
        .post(format!("{}/users/{}/reading-list", BASE_URL, user["id"]))
        .json(&json!({ "book_id": book["id"], "username": user["username"], "email": user["email"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = borrow(&client, &book, &user).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["book"]["available_copies"], 0);
    assert_eq!(body["book"]["available"], false);
    assert!(body["loan"]["return_date"].is_null());

    // Last copy is out
    let response = borrow(&client, &book, &user).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Not returned yet
    let response = client
        .post(format!("{}/users/{}/reading-list", BASE_URL, user["id"]))
        .json(&json!({ "book_id": book["id"], "username": user["username"], "email": user["email"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .get(format!("{}/loans/unreturned?book_id={}", BASE_URL, book["id"]))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["is_overdue"], false);

    let response = return_book(&client, &book, &user, true).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["loan"]["fine_amount"], 0);
    assert_eq!(body["loan"]["damage_fine"], 1000);
    assert_eq!(body["loan"]["total_fine"], 1000);
    assert_eq!(body["book"]["available_copies"], 1);
    assert_eq!(body["book"]["available"], true);

    let response = return_book(&client, &book, &user, false).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/users/{}/reading-list", BASE_URL, user["id"]))
        .json(&json!({ "book_id": book["id"], "username": user["username"], "email": user["email"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/users/{}/reading-list", BASE_URL, user["id"]))
        .json(&json!({ "book_id": book["id"], "username": user["username"], "email": user["email"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .get(format!("{}/users/{}/reading-list", BASE_URL, user["id"]))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["book"]["id"], book["id"]);

    let response = client
        .delete(format!("{}/users/{}/reading-list/{}", BASE_URL, user["id"], book["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_identity_mismatch_is_not_found() {
    let client = Client::new();
    let user = register(&client, "mismatch").await;
    let book = add_book(&client, 1).await;

    let response = client
        .post(format!("{}/books/{}/borrow", BASE_URL, book["id"]))
        .json(&json!({ "user_id": user["id"], "username": user["username"], "email": "someone.else@example.org" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = return_book(&client, &book, &user, false).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrow_of_last_copy() {
    let client = Client::new();
    let first = register(&client, "racea").await;
    let second = register(&client, "raceb").await;
    let book = add_book(&client, 1).await;

    let (a, b) = tokio::join!(borrow(&client, &book, &first), borrow(&client, &book, &second));
    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book["id"]))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["available_copies"], 0);
    assert_eq!(body["available"], false);
}

#[tokio::test]
#[ignore]
async fn test_total_copies_cannot_drop_below_loans() {
    let client = Client::new();
    let user = register(&client, "shrink").await;
    let book = add_book(&client, 2).await;
    assert_eq!(borrow(&client, &book, &user).await.status(), StatusCode::CREATED);

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book["id"]))
        .json(&json!({ "total_copies": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book["id"]))
        .json(&json!({ "total_copies": 4 }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_copies"], 4);
    assert_eq!(body["available_copies"], 3);

    // Delete is refused while a copy is out, and restricted by history after
    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(return_book(&client, &book, &user, false).await.status(), StatusCode::OK);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/books/{}?force=true", BASE_URL, book["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_return_by_loan_id() {
    let client = Client::new();
    let first = register(&client, "byida").await;
    let second = register(&client, "byidb").await;
    let book = add_book(&client, 2).await;

    let first_loan: Value = borrow(&client, &book, &first).await.json().await.unwrap();
    let second_loan: Value = borrow(&client, &book, &second).await.json().await.unwrap();

    // Damage flag in the body is honored
    let response = return_loan(&client, &first_loan["loan"]["id"], Some(json!({ "damage": true }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["loan"]["damage"], true);
    assert_eq!(body["loan"]["damage_fine"], 1000);
    assert_eq!(body["loan"]["total_fine"], 1000);
    assert_eq!(body["book"]["available_copies"], 1);

    let response = return_loan(&client, &first_loan["loan"]["id"], None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // A malformed body is refused and leaves the loan open
    let response = return_loan(&client, &second_loan["loan"]["id"], Some(json!({ "damage": "yes" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No body at all is an undamaged return
    let response = return_loan(&client, &second_loan["loan"]["id"], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["loan"]["damage"], false);
    assert_eq!(body["loan"]["total_fine"], 0);
    assert_eq!(body["book"]["available_copies"], 2);
    assert_eq!(body["book"]["available"], true);

    let response = return_loan(&client, &json!(i32::MAX), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_return_never_borrowed_is_not_found() {
    let client = Client::new();
    let user = register(&client, "neverlent").await;
    let book = add_book(&client, 1).await;

    let response = return_book(&client, &book, &user, false).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(borrow(&client, &book, &user).await.status(), StatusCode::CREATED);
    assert_eq!(return_book(&client, &book, &user, false).await.status(), StatusCode::OK);

    let response = return_book(&client, &book, &user, false).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_two_copies_three_borrowers() {
    let client = Client::new();
    let u1 = register(&client, "shelfa").await;
    let u2 = register(&client, "shelfb").await;
    let u3 = register(&client, "shelfc").await;
    let book = add_book(&client, 2).await;

    assert_eq!(borrow(&client, &book, &u1).await.status(), StatusCode::CREATED);

    let response = borrow(&client, &book, &u2).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["book"]["available_copies"], 0);
    assert_eq!(body["book"]["available"], false);

    assert_eq!(borrow(&client, &book, &u3).await.status(), StatusCode::CONFLICT);

    let response = return_book(&client, &book, &u1, false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["loan"]["total_fine"], 0);
    assert_eq!(body["book"]["available_copies"], 1);
    assert_eq!(body["book"]["available"], true);

    assert_eq!(borrow(&client, &book, &u3).await.status(), StatusCode::CREATED);
}
