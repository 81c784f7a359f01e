//! API integration tests.
//!
//! These tests drive the full router with axum's test utilities: bot updates
//! through the webhook, dashboard login, sessions and CSRF.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use remo::api::webhook::SECRET_TOKEN_HEADER;
use remo::api::{create_router, AppState, CSRF_HEADER};
use remo::{
    ActionError, ActionLayer, ActionOutcome, AuditEvent, Config, MemoryAuditSink, SigningKey,
};

const OWNER: i64 = 123_456_789;
const STRANGER: i64 = 666;
const WEBHOOK_SECRET: &str = "hook-secret";

/// Action layer that records what it was asked to run.
#[derive(Default)]
struct RecordingActions {
    calls: Mutex<Vec<String>>,
}

impl RecordingActions {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionLayer for RecordingActions {
    async fn execute(&self, command: &str, args: &[String]) -> Result<ActionOutcome, ActionError> {
        self.calls.lock().unwrap().push(command.to_string());
        match command {
            "explode" => Err(ActionError::Failed("driver crashed".to_string())),
            "status" => Ok(ActionOutcome::ok("All good").with_payload(json!({"cpu": 3}))),
            _ => Ok(ActionOutcome::ok(format!("{} {}", command, args.join(" ")))),
        }
    }
}

struct TestApp {
    router: Router,
    actions: Arc<RecordingActions>,
    audit: Arc<MemoryAuditSink>,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.bot.user_id = OWNER;
    config.dashboard.username = "admin".to_string();
    config.dashboard.password = "hunter2".to_string();
    config
        .bot
        .confirm_commands
        .insert("explode".to_string(), false);
    config
}

fn test_app() -> TestApp {
    test_app_with(test_config())
}

fn test_app_with(config: Config) -> TestApp {
    let actions = Arc::new(RecordingActions::default());
    let audit = Arc::new(MemoryAuditSink::new());
    let state = AppState::from_parts(
        &config,
        &SigningKey::generate(),
        WEBHOOK_SECRET.to_string(),
        actions.clone(),
        audit.clone(),
    )
    .unwrap();
    TestApp {
        router: create_router(state),
        actions,
        audit,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self, ip: &str, username: &str, password: &str) -> Response {
        self.send(login_request(ip, username, password)).await
    }

    /// Log in and return the `Cookie` header value.
    async fn session_cookie(&self) -> String {
        let response = self.login("10.0.0.1", "admin", "hunter2").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        set_cookie(&response)
    }

    async fn csrf_token(&self, cookie: &str) -> String {
        let response = self.send(get_with_cookie("/dashboard", cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        response_json(response).await["csrf_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn webhook(&self, update: Value) -> Response {
        self.send(json_request(
            Method::POST,
            &format!("/webhook/{}", WEBHOOK_SECRET),
            Some(update),
        ))
        .await
    }
}

/// Helper to create a JSON request.
fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn login_request(ip: &str, username: &str, password: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "username={}&password={}",
            username, password
        )))
        .unwrap();
    let peer: SocketAddr = format!("{}:40000", ip).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn command_request(command: &str, cookie: &str, csrf: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/commands/{}", command))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie);
    if let Some(token) = csrf {
        builder = builder.header(CSRF_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn webhook_with_token(token: &str, update: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/webhook/{}", WEBHOOK_SECRET))
        .header(header::CONTENT_TYPE, "application/json")
        .header(SECRET_TOKEN_HEADER, token)
        .body(Body::from(update.to_string()))
        .unwrap()
}

fn message_update(from: i64, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "from": {"id": from, "username": "someone"},
            "chat": {"id": from},
            "text": text
        }
    })
}

fn callback_update(from: i64, data: &str) -> Value {
    json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb-1",
            "from": {"id": from},
            "data": data,
            "message": {"message_id": 11, "chat": {"id": from}}
        }
    })
}

fn set_cookie(response: &Response) -> String {
    let value = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    value.split(';').next().unwrap().to_string()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

/// Helper to extract body as string.
async fn response_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Helper to extract JSON from response.
async fn response_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let response = app.send(json_request(Method::GET, "/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

// ============================================================================
// Bot Webhook Tests
// ============================================================================

#[tokio::test]
async fn test_webhook_wrong_secret_is_not_found() {
    let app = test_app();

    let response = app
        .send(json_request(
            Method::POST,
            "/webhook/guess",
            Some(message_update(OWNER, "/lock")),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_webhook_secret_token_header_must_match() {
    let app = test_app();

    let response = app
        .send(webhook_with_token("wrong", message_update(OWNER, "/lock")))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.actions.calls().is_empty());

    let response = app
        .send(webhook_with_token(WEBHOOK_SECRET, message_update(OWNER, "/lock")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.actions.calls(), vec!["lock".to_string()]);
}

#[tokio::test]
async fn test_required_secret_token_header() {
    let mut config = test_config();
    config.bot.require_secret_header = true;
    let app = test_app_with(config);

    let response = app.webhook(message_update(OWNER, "/lock")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.actions.calls().is_empty());

    let response = app
        .send(webhook_with_token(WEBHOOK_SECRET, message_update(OWNER, "/lock")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.actions.calls(), vec!["lock".to_string()]);
}

#[tokio::test]
async fn test_stranger_is_denied_without_side_effects() {
    let app = test_app();

    let response = app.webhook(message_update(STRANGER, "/shutdown")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["method"], "sendMessage");
    assert_eq!(json["chat_id"], STRANGER);
    assert_eq!(
        json["text"],
        "⛔ Access denied. You are not authorized to use this bot."
    );
    assert!(app.actions.calls().is_empty());
    assert_eq!(app.audit.count(AuditEvent::Unauthorized), 1);
}

#[tokio::test]
async fn test_owner_command_runs() {
    let app = test_app();

    let response = app.webhook(message_update(OWNER, "/volume 50")).await;
    let json = response_json(response).await;

    assert_eq!(json["text"], "volume 50");
    assert_eq!(app.actions.calls(), vec!["volume".to_string()]);
}

#[tokio::test]
async fn test_thirty_first_command_is_rate_limited() {
    let app = test_app();

    for _ in 0..30 {
        let json = response_json(app.webhook(message_update(OWNER, "/lock")).await).await;
        assert_eq!(json["text"], "lock ");
    }

    let json = response_json(app.webhook(message_update(OWNER, "/lock")).await).await;
    assert_eq!(json["text"], "⚠️ Too many commands. Please wait a moment.");
    assert_eq!(app.actions.calls().len(), 30);
    assert_eq!(app.audit.count(AuditEvent::RateLimited), 1);
}

#[tokio::test]
async fn test_plain_text_is_ignored() {
    let app = test_app();

    let response = app.webhook(message_update(OWNER, "hello")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "");
}

#[tokio::test]
async fn test_destructive_command_needs_confirmation() {
    let app = test_app();

    let json = response_json(app.webhook(message_update(OWNER, "/shutdown")).await).await;
    assert_eq!(
        json["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
        "confirm_shutdown"
    );
    assert!(app.actions.calls().is_empty());

    let json = response_json(app.webhook(callback_update(OWNER, "confirm_shutdown")).await).await;
    assert_eq!(json["method"], "editMessageText");
    assert_eq!(json["message_id"], 11);
    assert_eq!(app.actions.calls(), vec!["shutdown".to_string()]);

    // The prompt is single-use.
    let json = response_json(app.webhook(callback_update(OWNER, "confirm_shutdown")).await).await;
    assert_ne!(json["text"], "shutdown ");
    assert_eq!(app.actions.calls().len(), 1);
}

#[tokio::test]
async fn test_cancelled_confirmation_never_runs() {
    let app = test_app();

    app.webhook(message_update(OWNER, "/restart")).await;
    let json = response_json(app.webhook(callback_update(OWNER, "cancel")).await).await;
    assert_eq!(json["text"], "❌ Cancelled");

    app.webhook(callback_update(OWNER, "confirm_restart")).await;
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_stranger_cannot_confirm_owner_prompt() {
    let app = test_app();

    app.webhook(message_update(OWNER, "/shutdown")).await;
    let json = response_json(app.webhook(callback_update(STRANGER, "confirm_shutdown")).await).await;

    assert_eq!(json["text"], "⛔ Access denied");
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_bot_action_failure_is_generic() {
    let app = test_app();

    let response = app.webhook(message_update(OWNER, "/explode")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = response_json(response).await["text"].as_str().unwrap().to_string();
    assert!(!text.contains("driver crashed"));
    assert_eq!(app.audit.count(AuditEvent::CollaboratorFailure), 1);
}

// ============================================================================
// Dashboard Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_page() {
    let app = test_app();

    let response = app.send(json_request(Method::GET, "/", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert!(json["title"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_login_success_sets_strict_cookie() {
    let app = test_app();

    let response = app.login("10.0.0.1", "admin", "hunter2").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert_eq!(app.audit.count(AuditEvent::LoginSucceeded), 1);
}

#[tokio::test]
async fn test_login_failure_is_generic() {
    let app = test_app();

    for (username, password) in [("root", "hunter2"), ("admin", "wrong")] {
        let response = app.login("10.0.0.1", username, password).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let json = response_json(response).await;
        assert_eq!(json["error"], "Invalid username or password");
    }
}

#[tokio::test]
async fn test_login_lockout_after_five_failures() {
    let app = test_app();

    for _ in 0..5 {
        let response = app.login("1.2.3.4", "admin", "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.login("1.2.3.4", "admin", "hunter2").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let json = response_json(response).await;
    assert_eq!(
        json["error"],
        "Too many login attempts. Please try again in 15 minutes."
    );

    assert_eq!(app.audit.count(AuditEvent::LoginFailed), 5);
    assert_eq!(app.audit.count(AuditEvent::LoginSucceeded), 0);
    assert_eq!(app.audit.count(AuditEvent::LoginRateLimited), 1);

    // Another client is unaffected.
    let response = app.login("5.6.7.8", "admin", "hunter2").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_signed_in_visitor_skips_login_page() {
    let app = test_app();
    let cookie = app.session_cookie().await;

    let response = app.send(get_with_cookie("/", &cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_protected_routes_redirect_without_session() {
    let app = test_app();

    for uri in ["/dashboard", "/api/status", "/api/logs"] {
        let response = app.send(json_request(Method::GET, uri, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/");
    }

    let response = app
        .send(json_request(Method::POST, "/api/commands/lock", Some(json!({}))))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_dashboard_with_session() {
    let app = test_app();
    let cookie = app.session_cookie().await;

    let response = app.send(get_with_cookie("/dashboard", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["username"], "admin");
    assert_eq!(json["device_name"], "My PC");
    assert_eq!(json["bot_user_id"], OWNER);
    assert!(json["csrf_token"].as_str().unwrap().len() >= 43);
    let commands = json["commands"].as_array().unwrap();
    let shutdown = commands.iter().find(|c| c["name"] == "shutdown").unwrap();
    assert_eq!(shutdown["requires_confirmation"], true);
}

#[tokio::test]
async fn test_tampered_cookie_is_rejected_everywhere() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let (name, token) = cookie.split_once('=').unwrap();

    for position in [0, token.len() / 2, token.len() - 1] {
        let mut chars: Vec<char> = token.chars().collect();
        chars[position] = if chars[position] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}={}", name, chars.into_iter().collect::<String>());

        let response = app.send(get_with_cookie("/dashboard", &tampered)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "position {}", position);
        assert_eq!(location(&response), "/");
    }
}

#[tokio::test]
async fn test_status_with_session() {
    let app = test_app();
    let cookie = app.session_cookie().await;

    let response = app.send(get_with_cookie("/api/status", &cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["payload"]["cpu"], 3);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = test_app();
    let cookie = app.session_cookie().await;

    let response = app.send(get_with_cookie("/logout", &cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(app.audit.count(AuditEvent::Logout), 1);
}

// ============================================================================
// CSRF & Command Tests
// ============================================================================

#[tokio::test]
async fn test_command_without_csrf_is_forbidden() {
    let app = test_app();
    let cookie = app.session_cookie().await;

    let response = app
        .send(command_request("lock", &cookie, None, json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response_json(response).await["code"], "CSRF_MISMATCH");

    let response = app
        .send(command_request("lock", &cookie, Some("forged"), json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(app.actions.calls().is_empty());
    assert_eq!(app.audit.count(AuditEvent::CsrfMismatch), 2);
}

#[tokio::test]
async fn test_csrf_token_is_bound_to_its_session() {
    let app = test_app();
    let first = app.session_cookie().await;
    let second = app.session_cookie().await;
    let first_token = app.csrf_token(&first).await;

    let response = app
        .send(command_request("lock", &second, Some(&first_token), json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_command_with_csrf_runs() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    let response = app
        .send(command_request(
            "brightness",
            &cookie,
            Some(&csrf),
            json!({"args": ["80"]}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["message"], "brightness 80");
    assert_eq!(app.actions.calls(), vec!["brightness".to_string()]);
}

#[tokio::test]
async fn test_dashboard_confirmation_flag() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    let response = app
        .send(command_request("shutdown", &cookie, Some(&csrf), json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["code"], "CONFIRMATION_REQUIRED");
    assert!(app.actions.calls().is_empty());

    let response = app
        .send(command_request(
            "shutdown",
            &cookie,
            Some(&csrf),
            json!({"confirm": true}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.actions.calls(), vec!["shutdown".to_string()]);
}

#[tokio::test]
async fn test_invalid_command_name() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    let response = app
        .send(command_request("rm%20-rf", &cookie, Some(&csrf), json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.actions.calls().is_empty());
}

#[tokio::test]
async fn test_dashboard_action_failure_is_generic() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    let response = app
        .send(command_request("explode", &cookie, Some(&csrf), json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = response_json(response).await;
    assert_eq!(json["code"], "ACTION_FAILED");
    assert!(!json.to_string().contains("driver crashed"));
    assert_eq!(app.audit.count(AuditEvent::CollaboratorFailure), 1);
}

#[tokio::test]
async fn test_dashboard_commands_are_rate_limited() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    for i in 0..30 {
        let response = app
            .send(command_request(
                "shutdown",
                &cookie,
                Some(&csrf),
                json!({"confirm": true}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = app
        .send(command_request(
            "shutdown",
            &cookie,
            Some(&csrf),
            json!({"confirm": true}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(response_json(response).await["code"], "RATE_LIMITED");

    assert_eq!(app.actions.calls().len(), 30);
    assert_eq!(app.audit.count(AuditEvent::RateLimited), 1);
}

// ============================================================================
// Log View Tests
// ============================================================================

#[tokio::test]
async fn test_logs_newest_first_and_capped() {
    let app = test_app();
    let cookie = app.session_cookie().await;
    let csrf = app.csrf_token(&cookie).await;

    for _ in 0..24 {
        app.send(command_request("lock", &cookie, Some(&csrf), json!({})))
            .await;
    }
    app.send(command_request("mute", &cookie, Some(&csrf), json!({})))
        .await;

    let response = app.send(get_with_cookie("/api/logs", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    let logs = json["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 20);
    assert!(logs[0]["message"].as_str().unwrap().ends_with("/mute"));
    assert!(logs[1]["message"].as_str().unwrap().ends_with("/lock"));
    assert_eq!(logs[0]["level"], "INFO");
    assert_eq!(logs[0]["time"].as_str().unwrap().len(), 19);
}

#[tokio::test]
async fn test_logs_show_denials() {
    let app = test_app();
    app.login("10.0.0.9", "admin", "wrong").await;
    let cookie = app.session_cookie().await;

    let response = app.send(get_with_cookie("/api/logs", &cookie)).await;
    let json = response_json(response).await;
    let levels: Vec<_> = json["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["level"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(levels.first().map(String::as_str), Some("INFO"));
    assert!(levels.iter().any(|level| level == "WARN"));
}
