//! Group endpoints.
//!
//! Routes:
//! - GET /groups - Groups the caller belongs to
//! - POST /groups - Create a group (caller becomes admin)
//! - GET /groups/:id - Group with its members
//! - POST /groups/:id/members - Add a member (admins only)
//! - DELETE /groups/:id/members/:user_id - Remove a member or leave

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};

use crate::{
    error::Result,
    middleware::AuthUser,
    models::{AddGroupMemberRequest, CreateGroupRequest, GroupDto},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:id", get(get_group))
        .route("/:id/members", post(add_member))
        .route("/:id/members/:user_id", delete(remove_member))
}

#[axum::debug_handler]
async fn list_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<GroupDto>>> {
    Ok(Json(state.groups.list_user_groups(&auth.user_id).await?))
}

#[axum::debug_handler]
async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupDto>)> {
    let group = state.groups.create_group(request, &auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[axum::debug_handler]
async fn get_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<GroupDto>> {
    Ok(Json(
        state.groups.get_group_with_members(&id, &auth.user_id).await?,
    ))
}

#[axum::debug_handler]
async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<AddGroupMemberRequest>,
) -> Result<Json<GroupDto>> {
    Ok(Json(
        state
            .groups
            .add_user_to_group(&id, request, &auth.user_id)
            .await?,
    ))
}

#[axum::debug_handler]
async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<GroupDto>> {
    Ok(Json(
        state
            .groups
            .remove_user_from_group(&id, &user_id, &auth.user_id)
            .await?,
    ))
}
