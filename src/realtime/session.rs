use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::api::middleware::{ApiError, ApiResult, AppState};
use crate::models::{now_rfc3339, MessageStatus, Operator, SenderKind, SendMessageRequest};
use crate::realtime::events::{ChatFrame, NotificationFrame, OutboundEvent};
use crate::realtime::hub::{RealtimeHub, RoomKey};

/// Lifecycle of one live connection. A session that fails authorization
/// goes straight from Connecting to Closed without ever joining its room;
/// Closed is terminal and the connection is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connecting,
    Joined,
    Closed,
}

/// The authenticated party behind a chat connection.
#[derive(Debug, Clone)]
pub enum ChatParty {
    Device(String),
    Operator(Operator),
}

impl ChatParty {
    pub fn sender_kind(&self) -> SenderKind {
        match self {
            ChatParty::Device(_) => SenderKind::Device,
            ChatParty::Operator(_) => SenderKind::Operator,
        }
    }

    pub fn operator_id(&self) -> Option<String> {
        match self {
            ChatParty::Device(_) => None,
            ChatParty::Operator(op) => Some(op.id.clone()),
        }
    }
}

/// Caller identity presented in the connection query string.
#[derive(Debug, Clone, Default)]
pub struct ConnectAuth {
    pub device_id: Option<String>,
    pub operator_id: Option<String>,
}

/// Membership handle whose drop guarantees the leave cleanup even when the
/// session task unwinds or errors out of its loop early.
struct RoomGuard {
    hub: Arc<RealtimeHub>,
    room: RoomKey,
    conn_id: u64,
    released: bool,
}

impl RoomGuard {
    fn new(hub: Arc<RealtimeHub>, room: RoomKey, conn_id: u64) -> Self {
        Self {
            hub,
            room,
            conn_id,
            released: false,
        }
    }

    async fn leave(mut self) {
        self.released = true;
        self.hub.leave(&self.room, self.conn_id).await;
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        if !self.released {
            let hub = self.hub.clone();
            let room = self.room.clone();
            let conn_id = self.conn_id;
            tokio::spawn(async move {
                hub.leave(&room, conn_id).await;
            });
        }
    }
}

async fn authorize_chat(
    state: &AppState,
    conversation_id: i64,
    auth: &ConnectAuth,
) -> ApiResult<ChatParty> {
    let conversation = state
        .db
        .get_conversation(conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    if let Some(operator_id) = &auth.operator_id {
        let operator = state
            .db
            .get_operator(operator_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !operator.is_staff || !operator.is_active {
            return Err(ApiError::Forbidden(
                "Operator is not active staff".to_string(),
            ));
        }

        return Ok(ChatParty::Operator(operator));
    }

    if let Some(device_id) = &auth.device_id {
        state
            .db
            .get_active_device_session(device_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if conversation.device_id != *device_id {
            return Err(ApiError::Forbidden(
                "Device does not own this conversation".to_string(),
            ));
        }

        return Ok(ChatParty::Device(device_id.clone()));
    }

    Err(ApiError::Unauthorized)
}

/// Drive one chat connection from upgrade to close.
pub async fn run_chat_session(
    state: AppState,
    socket: WebSocket,
    conversation_id: i64,
    auth: ConnectAuth,
) {
    let mut session_state = SessionState::Connecting;
    let (mut sink, mut stream) = socket.split();

    tracing::trace!(
        "Chat session for conversation {} in state {:?}",
        conversation_id,
        session_state
    );

    let party = match authorize_chat(&state, conversation_id, &auth).await {
        Ok(party) => party,
        Err(err) => {
            tracing::info!(
                "Rejecting chat connection for conversation {}: {}",
                conversation_id,
                err
            );
            let _ = sink
                .send(WsMessage::Text(OutboundEvent::error(err.to_string()).to_json()))
                .await;
            let _ = sink.close().await;
            return;
        }
    };

    let room = RoomKey::Conversation(conversation_id);
    let hub = state.hub.clone();
    let (conn_id, mut outbound) = hub.join(room.clone()).await;
    let guard = RoomGuard::new(hub.clone(), room.clone(), conn_id);
    session_state = SessionState::Joined;

    let established = OutboundEvent::ConnectionEstablished {
        conversation_id: Some(conversation_id),
        operator_id: party.operator_id(),
        timestamp: now_rfc3339(),
    };
    if sink
        .send(WsMessage::Text(established.to_json()))
        .await
        .is_err()
    {
        guard.leave().await;
        return;
    }

    hub.broadcast(
        &room,
        OutboundEvent::UserJoined {
            sender_kind: party.sender_kind(),
            sender_id: party.operator_id(),
            timestamp: now_rfc3339(),
        },
    )
    .await;

    let idle = Duration::from_secs(state.ws_idle_timeout_secs);

    while session_state == SessionState::Joined {
        tokio::select! {
            event = outbound.recv() => {
                match event {
                    Some(event) => {
                        if sink.send(WsMessage::Text(event.to_json())).await.is_err() {
                            session_state = SessionState::Closed;
                        }
                    }
                    None => session_state = SessionState::Closed,
                }
            }
            incoming = tokio::time::timeout(idle, stream.next()) => {
                match incoming {
                    Err(_) => {
                        tracing::info!(
                            "Closing idle chat connection {} (conversation {})",
                            conn_id,
                            conversation_id
                        );
                        session_state = SessionState::Closed;
                    }
                    Ok(None) | Ok(Some(Err(_))) => session_state = SessionState::Closed,
                    Ok(Some(Ok(WsMessage::Close(_)))) => session_state = SessionState::Closed,
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        if let Some(reply) =
                            handle_chat_frame(&state, &room, &party, &text).await
                        {
                            if sink.send(WsMessage::Text(reply.to_json())).await.is_err() {
                                session_state = SessionState::Closed;
                            }
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }

    guard.leave().await;

    hub.broadcast(
        &room,
        OutboundEvent::UserLeft {
            sender_kind: party.sender_kind(),
            sender_id: party.operator_id(),
            timestamp: now_rfc3339(),
        },
    )
    .await;

    tracing::debug!(
        "Chat session {} for conversation {} closed",
        conn_id,
        conversation_id
    );
}

/// Handle one inbound chat frame. Broadcasts go to the room through the
/// hub; the returned event, if any, is a reply to the sending connection
/// only (errors never reach the room).
async fn handle_chat_frame(
    state: &AppState,
    room: &RoomKey,
    party: &ChatParty,
    text: &str,
) -> Option<OutboundEvent> {
    let frame: ChatFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            return Some(OutboundEvent::error(format!("Invalid frame: {}", err)));
        }
    };

    let RoomKey::Conversation(conversation_id) = room else {
        return Some(OutboundEvent::error("Not a chat room"));
    };

    match frame {
        ChatFrame::ChatMessage {
            content,
            message_type,
            media_url,
            is_urgent,
            metadata,
        } => {
            let request = SendMessageRequest {
                content,
                kind: message_type,
                media_url,
                is_urgent,
                metadata,
            };

            match state
                .message_service
                .create(
                    *conversation_id,
                    party.sender_kind(),
                    party.operator_id(),
                    request,
                )
                .await
            {
                Ok(message) => {
                    state
                        .hub
                        .broadcast(room, OutboundEvent::ChatMessage { message })
                        .await;
                    None
                }
                Err(err) => Some(OutboundEvent::error(err.to_string())),
            }
        }
        ChatFrame::MessageStatus { message_id, status } => {
            let result = match status {
                MessageStatus::Delivered => state.message_service.mark_delivered(message_id).await,
                MessageStatus::Read => state.message_service.mark_read(message_id).await,
                _ => {
                    return Some(OutboundEvent::error("Invalid message status update"));
                }
            };

            match result {
                Ok((_, true)) => {
                    state
                        .hub
                        .broadcast(
                            room,
                            OutboundEvent::MessageStatusUpdate {
                                message_id,
                                status,
                                timestamp: now_rfc3339(),
                            },
                        )
                        .await;
                    None
                }
                Ok((_, false)) => None,
                Err(err) => Some(OutboundEvent::error(err.to_string())),
            }
        }
        ChatFrame::TypingIndicator { is_typing } => {
            state
                .hub
                .broadcast(
                    room,
                    OutboundEvent::TypingIndicator {
                        sender_kind: party.sender_kind(),
                        sender_id: party.operator_id(),
                        is_typing,
                        timestamp: now_rfc3339(),
                    },
                )
                .await;
            None
        }
        ChatFrame::ReadReceipt { message_ids } => {
            if message_ids.is_empty() {
                return None;
            }

            match state
                .message_service
                .mark_read_many(*conversation_id, &message_ids)
                .await
            {
                Ok(count) if count > 0 => {
                    state
                        .hub
                        .broadcast(
                            room,
                            OutboundEvent::ReadReceipt {
                                sender_kind: party.sender_kind(),
                                sender_id: party.operator_id(),
                                message_ids,
                                count,
                                timestamp: now_rfc3339(),
                            },
                        )
                        .await;
                    None
                }
                Ok(_) => None,
                Err(err) => Some(OutboundEvent::error(err.to_string())),
            }
        }
    }
}

/// Drive one operator notification connection. Only active staff may join;
/// the room is the operator's personal notification stream.
pub async fn run_notification_session(state: AppState, socket: WebSocket, auth: ConnectAuth) {
    let mut session_state = SessionState::Connecting;
    let (mut sink, mut stream) = socket.split();

    tracing::trace!("Notification session in state {:?}", session_state);

    let operator = match require_staff(&state, &auth).await {
        Ok(operator) => operator,
        Err(err) => {
            tracing::info!("Rejecting notification connection: {}", err);
            let _ = sink
                .send(WsMessage::Text(OutboundEvent::error(err.to_string()).to_json()))
                .await;
            let _ = sink.close().await;
            return;
        }
    };

    let room = RoomKey::Operator(operator.id.clone());
    let hub = state.hub.clone();
    let (conn_id, mut outbound) = hub.join(room.clone()).await;
    let guard = RoomGuard::new(hub.clone(), room.clone(), conn_id);
    session_state = SessionState::Joined;

    let established = OutboundEvent::ConnectionEstablished {
        conversation_id: None,
        operator_id: Some(operator.id.clone()),
        timestamp: now_rfc3339(),
    };
    if sink
        .send(WsMessage::Text(established.to_json()))
        .await
        .is_err()
    {
        guard.leave().await;
        return;
    }

    let idle = Duration::from_secs(state.ws_idle_timeout_secs);

    while session_state == SessionState::Joined {
        tokio::select! {
            event = outbound.recv() => {
                match event {
                    Some(event) => {
                        if sink.send(WsMessage::Text(event.to_json())).await.is_err() {
                            session_state = SessionState::Closed;
                        }
                    }
                    None => session_state = SessionState::Closed,
                }
            }
            incoming = tokio::time::timeout(idle, stream.next()) => {
                match incoming {
                    Err(_) => {
                        tracing::info!(
                            "Closing idle notification connection {} (operator {})",
                            conn_id,
                            operator.id
                        );
                        session_state = SessionState::Closed;
                    }
                    Ok(None) | Ok(Some(Err(_))) => session_state = SessionState::Closed,
                    Ok(Some(Ok(WsMessage::Close(_)))) => session_state = SessionState::Closed,
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        let reply = handle_notification_frame(&state, &operator, &text).await;
                        if sink.send(WsMessage::Text(reply.to_json())).await.is_err() {
                            session_state = SessionState::Closed;
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }

    guard.leave().await;

    tracing::debug!(
        "Notification session {} for operator {} closed",
        conn_id,
        operator.id
    );
}

async fn require_staff(state: &AppState, auth: &ConnectAuth) -> ApiResult<Operator> {
    let operator_id = auth.operator_id.as_ref().ok_or(ApiError::Unauthorized)?;

    let operator = state
        .db
        .get_operator(operator_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !operator.is_staff || !operator.is_active {
        return Err(ApiError::Forbidden(
            "Operator is not active staff".to_string(),
        ));
    }

    Ok(operator)
}

async fn handle_notification_frame(
    state: &AppState,
    operator: &Operator,
    text: &str,
) -> OutboundEvent {
    let frame: NotificationFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => return OutboundEvent::error(format!("Invalid frame: {}", err)),
    };

    match frame {
        NotificationFrame::MarkRead { notification_id } => {
            match state
                .notification_service
                .mark_read(notification_id, &operator.id)
                .await
            {
                Ok(_) => OutboundEvent::NotificationMarkedRead {
                    notification_id,
                    timestamp: now_rfc3339(),
                },
                Err(err) => OutboundEvent::error(err.to_string()),
            }
        }
    }
}
