//! Authentication Routes
//!
//! Registration, email verification and login sessions.
//!
//! Routes:
//! - POST /auth/register - Create an account and send the verification email
//! - GET /auth/verify - Confirm an email address with the emailed token
//! - POST /auth/resend-verification - Issue a fresh verification token
//! - POST /auth/login - Open a session (token in body and cookie)
//! - POST /auth/logout - Close the current session

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    middleware::{require_auth, SessionToken, SESSION_COOKIE_NAME},
    models::{RegisterUserRequest, UserDto},
    services::{LoginRequest, LoginResponse},
    AppState,
};

use super::status::inc_registration_count;

/// Build authentication routes.
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .layer(axum::middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/verify", get(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/login", post(login))
        .merge(protected)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new user.
///
/// POST /auth/register
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserDto>)> {
    let user = state.users.register_user(request).await?;
    inc_registration_count();
    Ok((StatusCode::CREATED, Json(user)))
}

/// Verify an email address.
///
/// GET /auth/verify?token=...
#[axum::debug_handler]
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<UserDto>> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Validation("Verification token is required".to_string()))?;

    let user = state.users.verify_email(token.trim()).await?;
    Ok(Json(user))
}

/// Resend the verification email.
///
/// POST /auth/resend-verification
#[axum::debug_handler]
async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<ResendVerificationRequest>,
) -> Result<StatusCode> {
    state.users.resend_verification(&request.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Log in with email and password.
///
/// POST /auth/login
///
/// Returns the session token and also sets it as an HTTP-only cookie.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let response = state.auth.login(&request.email, &request.password).await?;

    let public_url = &crate::config().server.public_url;
    let cookie = Cookie::build((SESSION_COOKIE_NAME, response.token.clone()))
        .path("/")
        .http_only(true)
        .secure(public_url.starts_with("https"))
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.auth.session_max_age().num_seconds(),
        ))
        .build();

    Ok((jar.add(cookie), Json(response)))
}

/// Log out and clear the session cookie.
///
/// POST /auth/logout
#[axum::debug_handler]
async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    state.auth.logout(&token.0).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/").build());
    Ok((jar, StatusCode::NO_CONTENT))
}
