//! API Routes for Stack Mentor
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod auth;
mod conversations;
mod groups;
pub mod status;
mod users;
mod ws;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /api/auth/* - Registration, verification, login (public), logout (session)
/// - /api/users/* - Profiles and search (session)
/// - /api/groups/* - Groups and membership (session)
/// - /api/conversations/*, /api/messages/* - Messaging (session)
/// - /api/ws - Real-time events (session)
/// - /health, /metrics - Health checks (public)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health and status endpoints (public)
        .merge(status::routes())
        // Authentication routes (mixed public/protected)
        .nest("/api/auth", auth::routes(state.clone()))
        // Protected API routes
        .nest("/api", protected_routes(state))
}

/// Protected routes that require a login session.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", users::routes())
        .nest("/groups", groups::routes())
        .nest("/conversations", conversations::conversation_routes())
        .nest("/messages", conversations::message_routes())
        .merge(ws::routes())
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}

/// The full application: routes, state, request tracing and CORS.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes(state.clone()))
        .layer(axum::middleware::from_fn(status::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
