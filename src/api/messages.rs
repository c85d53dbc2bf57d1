use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{require_device_session, require_operator, ApiError, ApiResult, AppState};
use crate::models::{
    now_rfc3339, MarkReadResponse, MessageStatus, SenderKind, SendMessageRequest,
    UpdateMessageStatusRequest,
};
use crate::realtime::{OutboundEvent, RoomKey};

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub after: Option<i64>,
}

fn default_limit() -> i64 {
    50
}

async fn require_owning_device(
    state: &AppState,
    device_id: &str,
    conversation_id: i64,
) -> ApiResult<()> {
    require_device_session(state, device_id).await?;

    let conversation = state.conversation_service.get(conversation_id).await?;
    if conversation.device_id != device_id {
        return Err(ApiError::Forbidden(
            "Device does not own this conversation".to_string(),
        ));
    }

    Ok(())
}

/// REST fallback for sending a device message; the canonical event is also
/// broadcast to the conversation room so live viewers stay in sync.
pub async fn send_device_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<DeviceQuery>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    require_owning_device(&state, &query.device_id, conversation_id).await?;

    let message = state
        .message_service
        .create(conversation_id, SenderKind::Device, None, request)
        .await?;

    state
        .hub
        .broadcast(
            &RoomKey::Conversation(conversation_id),
            OutboundEvent::ChatMessage {
                message: message.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Operator sends a message into a conversation.
pub async fn send_admin_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let operator = require_operator(&state, &headers).await?;

    let message = state
        .message_service
        .create(
            conversation_id,
            SenderKind::Operator,
            Some(operator.id),
            request,
        )
        .await?;

    state
        .hub
        .broadcast(
            &RoomKey::Conversation(conversation_id),
            OutboundEvent::ChatMessage {
                message: message.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// List messages for a conversation (admin side), oldest first, with an
/// `after` cursor for reconnect catch-up.
pub async fn list_admin_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessageListQuery>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let page = state
        .message_service
        .list(conversation_id, query.limit, query.offset, query.after)
        .await?;

    Ok(Json(page))
}

/// Device-side delivery/read status update.
pub async fn update_message_status(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Query(query): Query<DeviceQuery>,
    Json(request): Json<UpdateMessageStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state.message_service.get(message_id).await?;
    require_owning_device(&state, &query.device_id, message.conversation_id).await?;

    let (message, changed) = match request.status {
        MessageStatus::Delivered => state.message_service.mark_delivered(message_id).await?,
        MessageStatus::Read => state.message_service.mark_read(message_id).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Invalid status update: {}",
                other
            )))
        }
    };

    if changed {
        state
            .hub
            .broadcast(
                &RoomKey::Conversation(message.conversation_id),
                OutboundEvent::MessageStatusUpdate {
                    message_id,
                    status: message.status,
                    timestamp: now_rfc3339(),
                },
            )
            .await;
    }

    Ok(Json(message))
}

/// Device marks everything the operator sent as read.
pub async fn mark_device_conversation_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<DeviceQuery>,
) -> ApiResult<impl IntoResponse> {
    require_owning_device(&state, &query.device_id, conversation_id).await?;

    let count = state
        .message_service
        .mark_conversation_read(conversation_id, SenderKind::Device)
        .await?;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        count,
    }))
}

/// Operator marks everything the device sent as read.
pub async fn mark_admin_conversation_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let count = state
        .message_service
        .mark_conversation_read(conversation_id, SenderKind::Operator)
        .await?;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        count,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Mobile API
        .route(
            "/api/mobile/conversations/:id/messages",
            post(send_device_message),
        )
        .route(
            "/api/mobile/conversations/:id/messages/read",
            post(mark_device_conversation_read),
        )
        .route(
            "/api/mobile/messages/:id/status",
            put(update_message_status),
        )
        // Admin API
        .route(
            "/api/admin/conversations/:id/messages",
            get(list_admin_messages).post(send_admin_message),
        )
        .route(
            "/api/admin/conversations/:id/messages/read",
            post(mark_admin_conversation_read),
        )
}
