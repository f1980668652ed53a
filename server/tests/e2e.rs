//! End-to-end operator journey against a scripted platform: QR login,
//! roster, template authoring, a partially failing broadcast, retry, and
//! logout.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;
use tower::ServiceExt;

use bullhorn_backend_api::{build_router, AppState};
use bullhorn_config::AppConfig;
use bullhorn_platform::mock::MockPlatform;
use bullhorn_platform::{Friend, GroupInfo};

struct TestApp {
    router: Router,
    platform: MockPlatform,
    _data_dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let data_dir = TempDir::new().expect("create temp dir");
        let data = data_dir.path();

        let mut config = AppConfig::default();
        config.storage.auth_file = data.join("auth.json");
        config.storage.qr_file = data.join("qr.png");
        config.storage.templates_file = data.join("templates.json");
        config.storage.failed_messages_file = data.join("failed.json");
        config.storage.uploads_dir = data.join("uploads");
        config.platform.qr_settle_delay_ms = 10;
        config.platform.qr_login_timeout_seconds = 2;

        let platform = MockPlatform::new();
        platform.set_friends(vec![
            Friend {
                user_id: "u-alice".to_string(),
                display_name: "Alice".to_string(),
                avatar: String::new(),
            },
            Friend {
                user_id: "u-bob".to_string(),
                display_name: "Bob".to_string(),
                avatar: String::new(),
            },
        ]);
        platform.set_groups(vec![GroupInfo {
            group_id: "g-ops".to_string(),
            name: "Ops announcements".to_string(),
            avatar: String::new(),
            member_count: Some(52),
        }]);

        let state = AppState::new(&config, Arc::new(platform.clone()));
        let router = build_router(state);

        Self {
            router,
            platform,
            _data_dir: data_dir,
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).expect("serialize body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("dispatch request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

#[tokio::test]
async fn full_operator_journey() {
    let app = TestApp::new();

    // Fresh process: waiting, no QR, empty roster.
    let (status, body) = app.call(Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "waiting");
    assert_eq!(body["hasQR"], false);

    // QR login.
    let (status, body) = app
        .call(Method::POST, "/api/qr", Some(json!({ "action": "create" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["qrUrl"].as_str().unwrap().starts_with("/qr.png"));
    sleep(Duration::from_millis(100)).await;

    let (_, body) = app.call(Method::GET, "/api/status", None).await;
    assert_eq!(body["status"], "success");

    // Roster: friends before groups.
    let (_, body) = app.call(Method::GET, "/api/chats", None).await;
    let chats = body["chats"].as_array().unwrap();
    assert_eq!(chats.len(), 3);
    assert_eq!(chats[0]["kind"], "individual");
    assert_eq!(chats[2]["kind"], "group");
    assert_eq!(chats[2]["memberCount"], 52);

    // Author a template.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/templates",
            Some(json!({ "displayName": "Launch note", "content": "We are live!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let template_id = body["template"]["id"].as_str().unwrap().to_string();

    // Broadcast with one failing recipient.
    app.platform.fail_sends_to("u-bob");
    let (status, body) = app
        .call(
            Method::POST,
            "/api/send-message",
            Some(json!({
                "chatIds": ["u-alice", "u-bob", "g-ops"],
                "templateId": template_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["sent"], 2);
    assert_eq!(body["failedCount"], 1);

    let (_, body) = app.call(Method::GET, "/api/failed-messages", None).await;
    let records = body["failedMessages"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["recipientId"], "u-bob");
    let record_id = records[0]["id"].as_str().unwrap().to_string();

    // Retry succeeds, then the operator clears the record.
    app.platform.clear_send_failure("u-bob");
    let (status, _) = app
        .call(
            Method::POST,
            "/api/send-message",
            Some(json!({ "chatIds": ["u-bob"], "templateId": template_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/failed-messages/{record_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.call(Method::GET, "/api/failed-messages", None).await;
    assert_eq!(body["failedMessages"].as_array().unwrap().len(), 0);

    // Logout tears everything down.
    let (status, _) = app.call(Method::POST, "/api/logout", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.call(Method::GET, "/api/status", None).await;
    assert_eq!(body["status"], "waiting");
    assert_eq!(body["hasQR"], false);

    let (status, _) = app.call(Method::POST, "/api/chats/refresh", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
