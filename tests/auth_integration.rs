use actix_web::web;
use chirpy::configuration::{AuthSettings, WebhookSettings};
use chirpy::session::SessionManager;
use chirpy::startup::run;
use chirpy::store::{AccountStore, InMemoryStore};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

const POLKA_API_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
}

fn test_auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: "integration-secret-key-at-least-32-chars".to_string(),
        access_token_ttl_seconds: 3600,
        refresh_token_ttl_hours: 1440,
        password_hash_cost: 4,
        store_timeout_ms: 1000,
        revoke_sessions_on_credential_change: false,
        expired_token_sweep_interval_secs: 0,
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(test_auth_settings())
}

fn spawn_app_with(auth: AuthSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let sessions = web::Data::new(SessionManager::new(store.clone(), auth));
    let webhooks = WebhookSettings {
        polka_api_key: POLKA_API_KEY.to_string(),
    };

    let server = run(listener, sessions, webhooks).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn post_with_auth(&self, path: &str, authorization: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .header("Authorization", authorization)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, password: &str) -> Value {
        let response = self
            .post_json("/users", &json!({"email": email, "password": password}))
            .await;
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .post_json("/login", &json!({"email": email, "password": password}))
            .await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

fn assert_error_body(body: &Value, code: &str) {
    assert_eq!(body["code"], code);
    assert!(body["error"].is_string());
    assert!(body["error_id"].is_string());
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_with_public_fields() {
    let app = spawn_app();

    let body = app.register("a@a.aa", "correcthorse").await;

    assert!(body["id"].is_string());
    assert!(body["created_at"].is_string());
    assert!(body["updated_at"].is_string());
    assert_eq!(body["email"], "a@a.aa");
    assert_eq!(body["is_upgraded"], false);
    assert!(body.get("hashed_password").is_none());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;

    let response = app
        .post_json("/users", &json!({"email": "a@a.aa", "password": "other"}))
        .await;

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_error_body(&body, "CONFLICT");
}

#[tokio::test]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app();
    let test_cases = vec![
        (json!({"email": "notanemail", "password": "correcthorse"}), "invalid email"),
        (json!({"email": "a@a.aa", "password": ""}), "empty password"),
        (json!({"email": "a@a.aa"}), "missing password"),
        (json!({"password": "correcthorse"}), "missing email"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app.post_json("/users", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);

        let body: Value = response.json().await.unwrap();
        assert_error_body(&body, "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/login", &app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_tokens_and_account() {
    let app = spawn_app();
    let registered = app.register("a@a.aa", "correcthorse").await;

    let body = app.login("a@a.aa", "correcthorse").await;

    assert_eq!(body["id"], registered["id"]);
    assert_eq!(body["email"], "a@a.aa");
    assert_eq!(body["is_upgraded"], false);
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    assert_eq!(body["refresh_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn login_failures_share_one_response() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;

    let wrong_password = app
        .post_json("/login", &json!({"email": "a@a.aa", "password": "wrong"}))
        .await;
    let unknown_email = app
        .post_json("/login", &json!({"email": "b@b.bb", "password": "correcthorse"}))
        .await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let wrong_password: Value = wrong_password.json().await.unwrap();
    let unknown_email: Value = unknown_email.json().await.unwrap();
    assert_error_body(&wrong_password, "INVALID_CREDENTIALS");
    assert_eq!(wrong_password["error"], unknown_email["error"]);
    assert_eq!(wrong_password["code"], unknown_email["code"]);
}

// --- Refresh / Revoke Tests ---

#[tokio::test]
async fn refresh_returns_new_access_token() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;
    let session = app.login("a@a.aa", "correcthorse").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    let response = app
        .post_with_auth("/refresh", &format!("Bearer {}", refresh_token))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn refresh_requires_bearer_header() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/refresh", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    for header in ["Basic abc", "bearer abc", "Bearer ", "Bearer  abc"] {
        let response = app.post_with_auth("/refresh", header).await;
        assert_eq!(401, response.status().as_u16(), "Should reject header: {}", header);
    }
}

#[tokio::test]
async fn refresh_rejects_unknown_token() {
    let app = spawn_app();

    let response = app.post_with_auth("/refresh", "Bearer deadbeef").await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_error_body(&body, "TOKEN_UNKNOWN");
}

#[tokio::test]
async fn revoke_is_idempotent_and_blocks_refresh() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;
    let session = app.login("a@a.aa", "correcthorse").await;
    let header = format!("Bearer {}", session["refresh_token"].as_str().unwrap());

    let first = app.post_with_auth("/revoke", &header).await;
    let second = app.post_with_auth("/revoke", &header).await;
    assert_eq!(204, first.status().as_u16());
    assert_eq!(204, second.status().as_u16());

    let response = app.post_with_auth("/refresh", &header).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_error_body(&body, "TOKEN_REVOKED");
}

#[tokio::test]
async fn revoke_rejects_unknown_token() {
    let app = spawn_app();

    let response = app.post_with_auth("/revoke", "Bearer deadbeef").await;
    assert_eq!(401, response.status().as_u16());
}

// --- Credential Update Tests ---

#[tokio::test]
async fn update_credentials_requires_access_token() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;
    let session = app.login("a@a.aa", "correcthorse").await;
    let body = json!({"email": "b@b.bb", "password": "batterystaple"});

    let missing = app
        .client
        .put(&format!("{}/users", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, missing.status().as_u16());

    // A refresh token is not an access token
    let wrong_kind = app
        .client
        .put(&format!("{}/users", &app.address))
        .bearer_auth(session["refresh_token"].as_str().unwrap())
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, wrong_kind.status().as_u16());
    let error: Value = wrong_kind.json().await.unwrap();
    assert_error_body(&error, "TOKEN_INVALID");
}

#[tokio::test]
async fn update_credentials_replaces_email_and_password() {
    let app = spawn_app();
    app.register("a@a.aa", "correcthorse").await;
    let session = app.login("a@a.aa", "correcthorse").await;

    let response = app
        .client
        .put(&format!("{}/users", &app.address))
        .bearer_auth(session["token"].as_str().unwrap())
        .json(&json!({"email": "b@b.bb", "password": "batterystaple"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "b@b.bb");
    assert_eq!(body["id"], session["id"]);

    app.login("b@b.bb", "batterystaple").await;
    let old = app
        .post_json("/login", &json!({"email": "a@a.aa", "password": "correcthorse"}))
        .await;
    assert_eq!(401, old.status().as_u16());

    // Sessions opened before the change stay valid by default
    let refresh = app
        .post_with_auth(
            "/refresh",
            &format!("Bearer {}", session["refresh_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(200, refresh.status().as_u16());
}

#[tokio::test]
async fn update_credentials_can_revoke_existing_sessions() {
    let mut auth = test_auth_settings();
    auth.revoke_sessions_on_credential_change = true;
    let app = spawn_app_with(auth);
    app.register("a@a.aa", "correcthorse").await;
    let session = app.login("a@a.aa", "correcthorse").await;

    let response = app
        .client
        .put(&format!("{}/users", &app.address))
        .bearer_auth(session["token"].as_str().unwrap())
        .json(&json!({"email": "a@a.aa", "password": "batterystaple"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let refresh = app
        .post_with_auth(
            "/refresh",
            &format!("Bearer {}", session["refresh_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(401, refresh.status().as_u16());
}

// --- Webhook Tests ---

async fn send_webhook(app: &TestApp, api_key: &str, body: &Value) -> reqwest::Response {
    app.client
        .post(&format!("{}/webhooks/polka", &app.address))
        .header("Authorization", format!("ApiKey {}", api_key))
        .json(body)
        .send()
        .await
        .expect("Failed to execute request.")
}

#[tokio::test]
async fn webhook_upgrades_account() {
    let app = spawn_app();
    let account = app.register("a@a.aa", "correcthorse").await;
    let body = json!({"event": "user.upgraded", "data": {"user_id": account["id"]}});

    let response = send_webhook(&app, POLKA_API_KEY, &body).await;
    assert_eq!(204, response.status().as_u16());

    let session = app.login("a@a.aa", "correcthorse").await;
    assert_eq!(session["is_upgraded"], true);

    let stored = app
        .store
        .find_account_by_email("a@a.aa")
        .await
        .expect("Account should exist");
    assert!(stored.is_upgraded);
}

#[tokio::test]
async fn webhook_rejects_wrong_api_key() {
    let app = spawn_app();
    let account = app.register("a@a.aa", "correcthorse").await;
    let body = json!({"event": "user.upgraded", "data": {"user_id": account["id"]}});

    let response = send_webhook(&app, "not-the-key", &body).await;
    assert_eq!(401, response.status().as_u16());

    let stored = app.store.find_account_by_email("a@a.aa").await.unwrap();
    assert!(!stored.is_upgraded);
}

#[tokio::test]
async fn webhook_ignores_other_events() {
    let app = spawn_app();
    let account = app.register("a@a.aa", "correcthorse").await;
    let body = json!({"event": "user.payment_failed", "data": {"user_id": account["id"]}});

    let response = send_webhook(&app, POLKA_API_KEY, &body).await;
    assert_eq!(204, response.status().as_u16());

    let stored = app.store.find_account_by_email("a@a.aa").await.unwrap();
    assert!(!stored.is_upgraded);
}

#[tokio::test]
async fn webhook_returns_404_for_unknown_account() {
    let app = spawn_app();
    let body = json!({
        "event": "user.upgraded",
        "data": {"user_id": "3311741c-680c-4546-99f3-fc9efac2036c"}
    });

    let response = send_webhook(&app, POLKA_API_KEY, &body).await;
    assert_eq!(404, response.status().as_u16());
}
