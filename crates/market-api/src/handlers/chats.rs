//! Chat handlers
//!
//! Endpoints for sending messages and reading chat history.

use axum::{extract::State, Json};
use market_service::dto::{
    ChatResponse, MarkReadResponse, MessageResponse, SendMessageRequest, SentMessageResponse,
};
use market_service::services::ChatService;

use crate::extractors::{AuthUser, IdPath, ValidatedJson};
use crate::response::{ApiResult, Created};
use crate::state::AppState;

/// Send a message, opening the chat on first contact
///
/// POST /chats/messages
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> ApiResult<Created<Json<SentMessageResponse>>> {
    let recipient_id = request.recipient_id;
    let part_id = request.part_id;

    let service = ChatService::new(state.service_context());
    let sent = service
        .send_message(auth.user_id, recipient_id, part_id, request.into_message())
        .await?;
    Ok(Created(Json(SentMessageResponse::from(&sent))))
}

/// Chats the caller takes part in, most recent activity first
///
/// GET /chats
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<ChatResponse>>> {
    let service = ChatService::new(state.service_context());
    let chats = service.list_chats(auth.user_id).await?;
    Ok(Json(
        chats
            .iter()
            .map(|c| ChatResponse::for_viewer(c, auth.user_id))
            .collect(),
    ))
}

/// GET /chats/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(chat_id): IdPath,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let service = ChatService::new(state.service_context());
    let messages = service.list_messages(chat_id, auth.user_id).await?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

/// Mark every message from the other participant as read
///
/// POST /chats/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(chat_id): IdPath,
) -> ApiResult<Json<MarkReadResponse>> {
    let service = ChatService::new(state.service_context());
    let marked = service.mark_read(chat_id, auth.user_id).await?;
    Ok(Json(MarkReadResponse { marked }))
}
