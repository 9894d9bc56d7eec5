//! User profile and directory endpoints.
//!
//! Routes:
//! - GET /users/me - Current user's profile
//! - PATCH /users/me - Update the current user's profile
//! - GET /users/search - Search verified users
//! - GET /users/:id - Another user's public profile

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::{
    error::Result,
    middleware::AuthUser,
    models::{UpdateProfileRequest, UserDto},
    services::UserSearchParams,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/search", get(search_users))
        .route("/:id", get(get_user))
}

/// Query parameters for user search.
///
/// `industries` is a comma separated list.
#[derive(Debug, Default, Deserialize)]
pub struct SearchUsersQuery {
    pub q: Option<String>,
    pub role: Option<String>,
    pub experience: Option<String>,
    pub industries: Option<String>,
}

impl From<SearchUsersQuery> for UserSearchParams {
    fn from(query: SearchUsersQuery) -> Self {
        let industries = query
            .industries
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        UserSearchParams {
            search_text: query.q,
            role: query.role,
            experience_range: query.experience,
            industries,
        }
    }
}

#[axum::debug_handler]
async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.get_user(&auth.user_id).await?))
}

#[axum::debug_handler]
async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.update_profile(&auth.user_id, request).await?))
}

/// Search verified users by name, role, experience and industry.
///
/// GET /users/search?q=&role=&experience=&industries=a,b
#[axum::debug_handler]
async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchUsersQuery>,
) -> Result<Json<Vec<UserDto>>> {
    Ok(Json(state.users.search_users(query.into()).await?))
}

#[axum::debug_handler]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.get_user(&id).await?))
}
