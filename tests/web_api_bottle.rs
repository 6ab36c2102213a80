//! Web API Bottle Tests
//!
//! Integration tests for the submission and confirmation endpoints.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use bottlemail::bottle::{BottleSettings, BottleStatus};
use bottlemail::config::{MailConfig, ReconcilerConfig};
use bottlemail::mailer::templates::{CONFIRM_SUBJECT, DELIVERY_SUBJECT};
use bottlemail::mailer::MemoryMailer;
use bottlemail::web::handlers::AppState;
use bottlemail::web::middleware::SubmitRateLimit;
use bottlemail::web::router::create_router;
use bottlemail::{BottleRepository, Database, DeliveryReconciler};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

const CONFIRM_BASE: &str = "https://bottle.test/confirmBottle";

struct TestApp {
    server: TestServer,
    db: Arc<Database>,
    mailer: Arc<MemoryMailer>,
}

/// Create a test server with an in-memory database and a recording mailer.
async fn create_test_app_with_throttle(per_minute: u32) -> TestApp {
    let db = Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to create test database"),
    );
    let mailer = Arc::new(MemoryMailer::new());

    let settings = BottleSettings {
        confirm_base_url: CONFIRM_BASE.to_string(),
        ..BottleSettings::default()
    };
    let app_state = Arc::new(AppState::new(db.clone(), mailer.clone(), settings));
    let router = create_router(app_state, &[], SubmitRateLimit::new(per_minute));

    let server = TestServer::new(router).expect("Failed to create test server");
    TestApp { server, db, mailer }
}

async fn create_test_app() -> TestApp {
    create_test_app_with_throttle(1000).await
}

fn future_time(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

/// Pull the bottle id out of the last confirmation mail sent to `email`.
fn confirmation_id(mailer: &MemoryMailer, email: &str) -> String {
    let sent = mailer.sent_to(email);
    let envelope = sent.last().expect("no confirmation mail");
    assert_eq!(envelope.subject, CONFIRM_SUBJECT);

    let marker = format!("{}?id=", CONFIRM_BASE);
    let start = envelope.html.find(&marker).expect("no confirmation link") + marker.len();
    envelope.html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

async fn submit(app: &TestApp, email: &str, text: &str, time: &str) -> axum_test::TestResponse {
    app.server
        .post("/newBottle")
        .json(&json!({ "email": email, "text": text, "time": time }))
        .await
}

async fn status_of(db: &Database, id: &str) -> BottleStatus {
    BottleRepository::new(db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .expect("bottle not found")
        .status
}

fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_submit_bottle() {
    let app = create_test_app().await;

    let response = submit(&app, "a@x.com", "hi", &future_time(1)).await;
    response.assert_status_ok();
    response.assert_text("Bottle created!");

    let id = confirmation_id(&app.mailer, "a@x.com");
    assert_eq!(status_of(&app.db, &id).await, BottleStatus::Unconfirmed);
}

#[tokio::test]
async fn test_submit_missing_fields() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/newBottle")
        .json(&json!({ "email": "a@x.com", "time": future_time(1) }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
    assert_eq!(error_message(&body), "Invalid arguments.");

    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_submit_malformed_body() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/newBottle")
        .text("{not json")
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_unparseable_time() {
    let app = create_test_app().await;

    let response = submit(&app, "a@x.com", "hi", "next tuesday").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_past_time() {
    let app = create_test_app().await;

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let response = submit(&app, "a@x.com", "hi", &past).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Invalid time.");

    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_third_unconfirmed_is_refused() {
    let app = create_test_app().await;

    submit(&app, "a@x.com", "one", &future_time(1))
        .await
        .assert_status_ok();
    submit(&app, "a@x.com", "two", &future_time(2))
        .await
        .assert_status_ok();

    let response = submit(&app, "a@x.com", "three", &future_time(3)).await;
    assert_eq!(response.status_code().as_u16(), 451);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Too many unconfirmed.");

    assert_eq!(app.mailer.sent_to("a@x.com").len(), 2);
}

#[tokio::test]
async fn test_confirm_bottle_get_and_post() {
    let app = create_test_app().await;

    submit(&app, "a@x.com", "hi", &future_time(1))
        .await
        .assert_status_ok();
    let id = confirmation_id(&app.mailer, "a@x.com");

    let response = app
        .server
        .get("/confirmBottle")
        .add_query_param("id", &id)
        .await;
    response.assert_status_ok();
    response.assert_text("Bottle confirmed!");
    assert_eq!(status_of(&app.db, &id).await, BottleStatus::Pending);

    // Following the link again is harmless.
    let response = app
        .server
        .post("/confirmBottle")
        .add_query_param("id", &id)
        .await;
    response.assert_status_ok();
    assert_eq!(status_of(&app.db, &id).await, BottleStatus::Pending);
}

#[tokio::test]
async fn test_confirm_unknown_id() {
    let app = create_test_app().await;

    let response = app
        .server
        .get("/confirmBottle")
        .add_query_param("id", "00000000-0000-4000-8000-000000000000")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Invalid document.");
}

#[tokio::test]
async fn test_confirm_missing_id() {
    let app = create_test_app().await;

    let response = app.server.get("/confirmBottle").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Invalid arguments.");
}

#[tokio::test]
async fn test_submit_throttled_per_client() {
    let app = create_test_app_with_throttle(2).await;

    submit(&app, "a@x.com", "one", &future_time(1))
        .await
        .assert_status_ok();
    submit(&app, "b@x.com", "two", &future_time(1))
        .await
        .assert_status_ok();

    let response = submit(&app, "c@x.com", "three", &future_time(1)).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Confirmation links are not throttled.
    app.server
        .get("/confirmBottle")
        .add_query_param("id", confirmation_id(&app.mailer, "a@x.com"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_test_app().await;

    let response = app.server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert!(doc["paths"]["/newBottle"].is_object());
    assert!(doc["paths"]["/confirmBottle"].is_object());
}

#[tokio::test]
async fn test_submit_confirm_deliver() {
    let app = create_test_app().await;

    submit(&app, "a@x.com", "remember the garden", &future_time(1))
        .await
        .assert_status_ok();
    let id = confirmation_id(&app.mailer, "a@x.com");

    let reconciler = DeliveryReconciler::new(
        app.db.clone(),
        app.mailer.clone(),
        MailConfig::default(),
        ReconcilerConfig::default(),
    );

    // Unconfirmed bottles are never delivered.
    let report = reconciler
        .sweep_at(Utc::now() + Duration::days(2))
        .await
        .unwrap();
    assert!(report.is_idle());

    app.server
        .get("/confirmBottle")
        .add_query_param("id", &id)
        .await
        .assert_status_ok();

    // Not due yet.
    let report = reconciler.sweep().await.unwrap();
    assert!(report.is_idle());

    let report = reconciler
        .sweep_at(Utc::now() + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.delivered, 1);

    let bottle = BottleRepository::new(app.db.pool())
        .get_by_id(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bottle.status, BottleStatus::Complete);
    assert!(bottle.sent_at.is_some());

    let delivered: Vec<_> = app
        .mailer
        .sent_to("a@x.com")
        .into_iter()
        .filter(|e| e.subject == DELIVERY_SUBJECT)
        .collect();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].html.contains("remember the garden"));
}
