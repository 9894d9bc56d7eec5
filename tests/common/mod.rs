//! Shared helpers for integration tests.
//!
//! Every test gets its own in-memory SQLite database with migrations applied
//! and a [`MemoryMailer`] capturing verification emails.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderValue, Request},
    Router,
};
use axum_test::TestServer;
use serde_json::{json, Value};
use stack_mentor::config::Config;
use stack_mentor::db;
use stack_mentor::services::MemoryMailer;
use stack_mentor::{api, AppState};

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: MemoryMailer,
}

/// Build application state over a fresh in-memory database.
pub async fn build_test_state() -> (AppState, MemoryMailer) {
    let pool = db::init_pool(":memory:", 1)
        .await
        .expect("Failed to create test database");
    db::migrate(&pool).await.expect("Failed to run migrations");

    let mailer = MemoryMailer::new();
    let state = AppState::from_parts(pool, &Config::default(), Arc::new(mailer.clone()));
    (state, mailer)
}

/// Router with state, as served by the binary.
pub async fn build_test_router() -> Router {
    let (state, _) = build_test_state().await;
    api::app(state)
}

pub async fn build_test_app() -> TestApp {
    let (state, mailer) = build_test_state().await;
    let server = TestServer::new(api::app(state.clone())).expect("Failed to create test server");
    TestApp {
        server,
        state,
        mailer,
    }
}

pub fn bearer_auth(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

pub fn registration_body(name: &str, email: &str, role: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "dateOfBirth": "1999-11-27",
        "role": role,
        "yearsOfExperience": 5,
        "skillsOrInterests": ["Rust", "Axum"],
        "city": "Columbus",
        "state": "OH",
        "gender": "Other",
    })
}

impl TestApp {
    /// Register a user and return the created profile.
    pub async fn register(&self, name: &str, email: &str, role: &str) -> Value {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&registration_body(name, email, role))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Wait for the verification email sent to `email` and pull the token
    /// out of its link.
    pub async fn verification_token(&self, email: &str) -> String {
        for _ in 0..50 {
            let token = self
                .mailer
                .sent()
                .iter()
                .rev()
                .find(|m| m.to == email)
                .and_then(|m| extract_token(&m.text));
            if let Some(token) = token {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("No verification email sent to {}", email);
    }

    pub async fn login(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .expect("login returns a token")
            .to_string()
    }

    /// Register, verify and log in. Returns `(user_id, session_token)`.
    pub async fn signup(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let user = self.register(name, email, role).await;
        let token = self.verification_token(email).await;
        self.server
            .get("/api/auth/verify")
            .add_query_param("token", &token)
            .await
            .assert_status_ok();
        let session = self.login(email).await;
        (user["userId"].as_str().unwrap().to_string(), session)
    }
}

fn extract_token(text: &str) -> Option<String> {
    let start = text.find("token=")? + "token=".len();
    let raw: String = text[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    urlencoding::decode(&raw).ok().map(|t| t.into_owned())
}

/// Extract JSON from a raw response body.
pub async fn extract_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
