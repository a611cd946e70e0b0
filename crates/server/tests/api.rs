use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use engine::{Engine, Identity, JwtGate, ResultEngine, TextGenerator};
use migration::MigratorTrait;
use server::{ServerState, router};

const SECRET: &str = "a-server-test-secret-at-least-32-bytes";

struct Canned(String);

#[async_trait]
impl TextGenerator for Canned {
    async fn complete(&self, _prompt: &str) -> ResultEngine<String> {
        Ok(self.0.clone())
    }
}

async fn app_replying(reply: &str) -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .generator(Arc::new(Canned(reply.to_string())))
        .gate(JwtGate::new(SECRET, Duration::days(1)).unwrap())
        .build()
        .await
        .unwrap();
    router(ServerState {
        engine: Arc::new(engine),
    })
}

async fn app() -> Router {
    app_replying(r#"{"transactions": []}"#).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with(app, method, uri, token, &[], body).await
}

async fn send_with(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn sign_up(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"name": "Alice", "email": email, "password": "s3cret!password"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

fn expense(amount: Value) -> Value {
    json!({"type": "expense", "amount": amount, "category": "food", "paymentMethod": "upi"})
}

#[tokio::test]
async fn protected_routes_reject_missing_malformed_and_expired_tokens() {
    let app = app().await;
    let expired = JwtGate::new(SECRET, Duration::hours(-2))
        .unwrap()
        .issue(&Identity::new(Uuid::new_v4()))
        .unwrap();

    let (status, missing) = send(&app, "GET", "/api/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, malformed) = send(&app, "GET", "/api/transactions", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(malformed, missing);

    let (status, body) = send(&app, "GET", "/api/transactions", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, missing);

    let (status, body) = send_with(
        &app,
        "GET",
        "/api/transactions",
        None,
        &[("authorization", "Basic YWxpY2U6cHc=")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, missing);
}

#[tokio::test]
async fn sign_up_and_log_in() {
    let app = app().await;
    let token = sign_up(&app, "alice@example.com").await;
    assert!(!token.is_empty());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "s3cret!password"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"name": "Alice", "email": "alice@example.com", "password": "s3cret!password"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"name": "Bob", "email": "bob@example.com", "password": "password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "password");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong!pass1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn parsed_candidates_are_stored_only_when_submitted() {
    let reply = r#"{"transactions": [
        {"type": "income", "amount": 1000, "category": "Family", "description": "from mom", "paymentMethod": null, "confidence": 0.9},
        {"type": "expense", "amount": 200, "category": "Food", "description": "pizza", "paymentMethod": "cash", "confidence": 0.8}
    ]}"#;
    let app = app_replying(reply).await;
    let token = sign_up(&app, "alice@example.com").await;

    let (status, parsed) = send(
        &app,
        "POST",
        "/api/ai/parse",
        Some(&token),
        Some(json!({"text": "Received 1000 from mom. Ate pizza for 200."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["transactions"][1]["category"], "food");

    let (_, listed) = send(&app, "GET", "/api/transactions", Some(&token), None).await;
    assert!(listed["transactions"].as_array().unwrap().is_empty());

    let (status, inserted) = send(
        &app,
        "POST",
        "/api/transactions/bulk",
        Some(&token),
        Some(parsed),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(inserted["count"], 2);
    assert_eq!(
        inserted["transactions"][0]["occurredAt"],
        inserted["transactions"][1]["occurredAt"]
    );

    let (_, listed) = send(&app, "GET", "/api/transactions", Some(&token), None).await;
    assert_eq!(listed["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unparseable_model_output_is_returned_to_the_caller() {
    let app = app_replying("Sure! Here is the JSON you asked for").await;
    let token = sign_up(&app, "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/parse",
        Some(&token),
        Some(json!({"text": "pizza 200"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["raw"], "Sure! Here is the JSON you asked for");
}

#[tokio::test]
async fn invalid_records_are_rejected_with_their_position() {
    let app = app().await;
    let token = sign_up(&app, "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/transactions",
        Some(&token),
        Some(expense(json!(-5))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "amount");

    let (status, body) = send(
        &app,
        "POST",
        "/api/transactions/bulk",
        Some(&token),
        Some(json!({"transactions": [expense(json!(10)), expense(json!("12"))]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["index"], 1);
    assert_eq!(body["field"], "amount");

    let (_, listed) = send(&app, "GET", "/api/transactions", Some(&token), None).await;
    assert!(listed["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn partial_bulk_reports_each_record() {
    let app = app().await;
    let token = sign_up(&app, "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/transactions/bulk/partial",
        Some(&token),
        Some(json!({"transactions": [expense(json!(10)), expense(json!(0))]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["committed"], 1);
    assert!(body["results"][0]["transaction"].is_object());
    assert_eq!(body["results"][1]["error"]["field"], "amount");
}

#[tokio::test]
async fn idempotency_key_header_replays_the_first_insert() {
    let app = app().await;
    let token = sign_up(&app, "alice@example.com").await;
    let headers = [("idempotency-key", "retry-1")];

    let (status, first) = send_with(
        &app,
        "POST",
        "/api/transactions",
        Some(&token),
        &headers,
        Some(expense(json!(10))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, second) = send_with(
        &app,
        "POST",
        "/api/transactions",
        Some(&token),
        &headers,
        Some(expense(json!(10))),
    )
    .await;
    assert_eq!(first["id"], second["id"]);

    let (_, listed) = send(&app, "GET", "/api/transactions", Some(&token), None).await;
    assert_eq!(listed["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn update_and_delete_are_scoped_to_the_owner() {
    let app = app().await;
    let alice = sign_up(&app, "alice@example.com").await;
    let bob = sign_up(&app, "bob@example.com").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/transactions",
        Some(&alice),
        Some(expense(json!(200))),
    )
    .await;
    let uri = format!("/api/transactions/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "PATCH", &uri, Some(&bob), Some(json!({"amount": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice),
        Some(json!({"amount": 250, "category": "Dinner"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["amount"], 250.0);
    assert_eq!(updated["category"], "dinner");
    assert_eq!(updated["ownerId"], created["ownerId"]);

    let (status, deleted) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], created["id"]);

    let (_, listed) = send(&app, "GET", "/api/transactions", Some(&alice), None).await;
    assert!(listed["transactions"].as_array().unwrap().is_empty());
}
