//! Message history, search, and administrative deletion.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use serde::Serialize;
use uuid::Uuid;

use parley_types::message::{HistoryRequest, Message, MessageQuery};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// History and search results: `{"messages": [...]}`.
#[derive(Debug, Serialize)]
pub struct MessagesPage {
    pub messages: Vec<Message>,
}

impl MessagesPage {
    fn respond(messages: Vec<Message>, start: Instant) -> ApiResponse<Self> {
        let count = messages.len();
        ApiResponse::success(Self { messages }, start).with_count(count)
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedMessage {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

/// GET /api/v1/messages - Conversation history, most recent first.
pub async fn history(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(request): Query<HistoryRequest>,
) -> Result<ApiResponse<MessagesPage>, AppError> {
    let start = Instant::now();
    let messages = state.history.history(&identity.user_id, request).await?;
    Ok(MessagesPage::respond(messages, start))
}

/// GET /api/v1/messages/search - Filtered search over what the caller may read.
pub async fn search(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<MessageQuery>,
) -> Result<ApiResponse<MessagesPage>, AppError> {
    let start = Instant::now();
    let messages = state.history.search(&identity.user_id, query).await?;
    Ok(MessagesPage::respond(messages, start))
}

/// DELETE /api/v1/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<DeletedMessage>, AppError> {
    let start = Instant::now();
    state.history.delete_message(&identity.user_id, &id).await?;
    Ok(ApiResponse::success(DeletedMessage { id }, start))
}

/// DELETE /api/v1/messages/public - Remove every public message.
pub async fn delete_public(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<ApiResponse<DeletedCount>, AppError> {
    let start = Instant::now();
    let deleted = state.history.delete_public(&identity.user_id).await?;
    Ok(ApiResponse::success(DeletedCount { deleted }, start))
}
