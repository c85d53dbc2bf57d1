use axum::http::HeaderMap;
use std::sync::Arc;

use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{DeviceSession, Operator};
use crate::realtime::RealtimeHub;
use crate::services::{ConversationService, MessageService, NotificationService};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<RealtimeHub>,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub notification_service: NotificationService,
    pub ws_idle_timeout_secs: u64,
}

/// Header carrying the operator identity on admin endpoints.
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";

/// Resolve the calling operator from the request headers and require staff
/// status. Admin endpoints and operator-authored messages always carry an
/// identity; there is no anonymous operator path.
pub async fn require_operator(state: &AppState, headers: &HeaderMap) -> ApiResult<Operator> {
    let operator_id = headers
        .get(OPERATOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

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

/// Resolve an active device session or reject the call.
pub async fn require_device_session(
    state: &AppState,
    device_id: &str,
) -> ApiResult<DeviceSession> {
    state
        .db
        .get_active_device_session(device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid or inactive device".to_string()))
}
