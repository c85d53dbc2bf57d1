use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::api::middleware::AppState;
use crate::realtime::session::{run_chat_session, run_notification_session};
use crate::realtime::ConnectAuth;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub device_id: Option<String>,
    pub operator_id: Option<String>,
}

impl From<WsAuthQuery> for ConnectAuth {
    fn from(query: WsAuthQuery) -> Self {
        ConnectAuth {
            device_id: query.device_id,
            operator_id: query.operator_id,
        }
    }
}

/// Live bidirectional chat channel for one conversation. Authorization
/// happens inside the session: unauthorized callers get an error frame and
/// an immediate close, never a room join.
pub async fn chat_socket(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        run_chat_session(state, socket, conversation_id, query.into())
    })
}

/// Personal notification stream for one operator.
pub async fn notification_socket(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_notification_session(state, socket, query.into()))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/chat/:conversation_id", get(chat_socket))
        .route("/ws/notifications", get(notification_socket))
}
