//! Axum route handlers for the Messages API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::binder;
use crate::errors::AppError;
use crate::models::message::MessageRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub match_id: Uuid,
    pub from_user_id: Uuid,
    pub content: String,
}

/// POST /api/v1/messages
///
/// The recipient is inferred from the match — the reporter on the other
/// side. Non-participants get an authorization error and no message row.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageRow>, AppError> {
    let message = binder::send(
        &state.db,
        state.notifier.as_ref(),
        request.match_id,
        request.from_user_id,
        &request.content,
    )
    .await?;
    Ok(Json(message))
}

#[derive(Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageRow>,
}

/// GET /api/v1/messages?user_id=...
pub async fn handle_list_messages(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<MessageListResponse>, AppError> {
    let messages = binder::list_for(&state.db, params.user_id).await?;
    Ok(Json(MessageListResponse { messages }))
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Uuid,
}

/// PATCH /api/v1/messages/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> Result<StatusCode, AppError> {
    binder::mark_read(&state.db, message_id, request.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
