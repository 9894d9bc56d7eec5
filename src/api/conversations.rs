//! Conversation and message endpoints.
//!
//! Routes:
//! - GET /conversations - Conversations the caller takes part in
//! - POST /conversations/direct - Open a direct conversation
//! - GET /conversations/:id/messages - Messages, oldest first
//! - POST /conversations/:id/messages - Send a message
//! - POST /messages/:id/read - Mark a message read
//! - PATCH /messages/:id - Edit own message
//! - DELETE /messages/:id - Soft delete own message

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};

use crate::{
    error::Result,
    middleware::AuthUser,
    models::{
        ConversationDto, EditMessageRequest, MessageDto, SendMessageRequest,
        StartDirectConversationRequest,
    },
    AppState,
};

use super::status::inc_message_count;

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations))
        .route("/direct", post(start_direct_conversation))
        .route("/:id/messages", get(list_messages).post(send_message))
}

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", patch(edit_message).delete(delete_message))
        .route("/:id/read", post(mark_read))
}

#[axum::debug_handler]
async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationDto>>> {
    Ok(Json(state.messages.list_conversations(&auth.user_id).await?))
}

/// Returns the existing conversation when the pair already has one.
#[axum::debug_handler]
async fn start_direct_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<StartDirectConversationRequest>,
) -> Result<Json<ConversationDto>> {
    Ok(Json(
        state
            .messages
            .start_direct_conversation(&auth.user_id, &request.user_id)
            .await?,
    ))
}

#[axum::debug_handler]
async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageDto>>> {
    Ok(Json(state.messages.list_messages(&id, &auth.user_id).await?))
}

#[axum::debug_handler]
async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>)> {
    let message = state
        .messages
        .send_message(&id, &auth.user_id, &request.content, request.media_urls)
        .await?;
    inc_message_count();
    Ok((StatusCode::CREATED, Json(message)))
}

#[axum::debug_handler]
async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.messages.mark_read(&id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn edit_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<MessageDto>> {
    Ok(Json(
        state
            .messages
            .edit_message(&id, &auth.user_id, &request.content)
            .await?,
    ))
}

#[axum::debug_handler]
async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageDto>> {
    Ok(Json(state.messages.delete_message(&id, &auth.user_id).await?))
}
