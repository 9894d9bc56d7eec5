//! Middleware for Stack Mentor.
//!
//! `require_auth` resolves the caller's session token and injects
//! [`AuthUser`] into request extensions.
//!
//! Token sources, in priority order:
//! 1. `Authorization: Bearer {token}` header
//! 2. `stackmentor_session` cookie (set at login)
//! 3. `?token={token}` query parameter (websocket clients that cannot set headers)

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{error::Error, AppState};

pub use crate::services::AuthUser;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "stackmentor_session";

/// Raw session token of the current request, for logout.
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

/// Extract the session token from header, cookie or query string.
fn extract_token(req: &Request<Body>, jar: &CookieJar) -> Option<String> {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    if let Some(query) = req.uri().query() {
        for part in query.split('&') {
            if let Some(token) = part.strip_prefix("token=") {
                if let Ok(decoded) = urlencoding::decode(token) {
                    return Some(decoded.into_owned());
                }
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Middleware that requires a valid login session.
///
/// # Errors
///
/// Returns 401 Unauthorized if no token is present, the token is unknown
/// or malformed, or the session has expired.
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use stack_mentor::middleware::require_auth;
///
/// let app = Router::new()
///     .route("/api/users/me", get(get_me))
///     .layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = extract_token(&req, &jar).ok_or(Error::Unauthenticated)?;

    let user = state.auth.validate_session(&token).await?;

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(SessionToken(token));

    Ok(next.run(req).await)
}
