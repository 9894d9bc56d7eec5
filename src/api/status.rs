//! Status Routes
//!
//! Health checks and metrics.
//!
//! Routes:
//! - GET /health - Basic health check
//! - GET /health/ready - Readiness check (database reachable)
//! - GET /health/live - Liveness check (server responding)
//! - GET /metrics - Prometheus metrics endpoint

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

// Global metrics (simple counters)
static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static REGISTRATION_COUNT: AtomicU64 = AtomicU64::new(0);
static MESSAGE_COUNT: AtomicU64 = AtomicU64::new(0);
static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize startup time. Call this once at server start.
pub fn init_startup_time() {
    let _ = STARTUP_TIME.get_or_init(Instant::now);
}

/// Get uptime in seconds since server start.
fn get_uptime_seconds() -> u64 {
    STARTUP_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0)
}

/// Increment request counter.
pub fn inc_request_count() {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Increment error counter.
pub fn inc_error_count() {
    ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_registration_count() {
    REGISTRATION_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_message_count() {
    MESSAGE_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Middleware counting every request.
pub async fn track_requests(req: Request<Body>, next: Next) -> Response {
    inc_request_count();
    next.run(req).await
}

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/live", get(liveness_check))
        .route("/metrics", get(prometheus_metrics))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<DependencyCheck>,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Basic health check.
///
/// GET /health
///
/// Returns 200 if the server is running.
#[axum::debug_handler]
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: get_uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check.
///
/// GET /health/ready
///
/// Returns 503 if the database cannot be reached.
#[axum::debug_handler]
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_check = check_database(&state).await;
    let ready = db_check.status == HealthStatus::Healthy;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            checks: vec![db_check],
        }),
    )
}

/// Liveness check.
///
/// GET /health/live
#[axum::debug_handler]
async fn liveness_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Prometheus metrics.
///
/// GET /metrics
#[axum::debug_handler]
async fn prometheus_metrics() -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP stack_mentor_requests_total Total number of HTTP requests
# TYPE stack_mentor_requests_total counter
stack_mentor_requests_total {}

# HELP stack_mentor_errors_total Total number of server errors
# TYPE stack_mentor_errors_total counter
stack_mentor_errors_total {}

# HELP stack_mentor_registrations_total Total number of user registrations
# TYPE stack_mentor_registrations_total counter
stack_mentor_registrations_total {}

# HELP stack_mentor_messages_total Total number of messages sent
# TYPE stack_mentor_messages_total counter
stack_mentor_messages_total {}

# HELP stack_mentor_uptime_seconds Seconds since server start
# TYPE stack_mentor_uptime_seconds gauge
stack_mentor_uptime_seconds {}

# HELP stack_mentor_up Whether the service is up
# TYPE stack_mentor_up gauge
stack_mentor_up 1
"#,
        REQUEST_COUNT.load(Ordering::Relaxed),
        ERROR_COUNT.load(Ordering::Relaxed),
        REGISTRATION_COUNT.load(Ordering::Relaxed),
        MESSAGE_COUNT.load(Ordering::Relaxed),
        get_uptime_seconds(),
    );

    (
        StatusCode::OK,
        [(
            "Content-Type",
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check database connectivity.
async fn check_database(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let result = crate::db::health_check(&state.db).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => DependencyCheck {
            name: "database".into(),
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        },
        Err(e) => DependencyCheck {
            name: "database".into(),
            status: HealthStatus::Unhealthy,
            latency_ms: Some(latency_ms),
            message: Some(e.to_string()),
        },
    }
}
