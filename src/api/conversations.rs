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
    AssignConversationRequest, ConversationDetailResponse, ConversationStatus, Priority,
    StartConversationRequest, UpdateConversationRequest,
};

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub device_id: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned: Option<String>,
    /// Narrow to one operator's conversations.
    pub assigned_to: Option<String>,
}

/// Start a new conversation for a device or return the open one.
/// 201 when this call created the conversation, 200 otherwise.
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(request): Json<StartConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let (conversation, created) = state
        .conversation_service
        .get_or_create(&request.device_id, &request.subject)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(conversation)))
}

/// List a device's conversations, most recent activity first.
pub async fn list_device_conversations(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> ApiResult<impl IntoResponse> {
    let conversations = state
        .conversation_service
        .list_for_device(&query.device_id)
        .await?;

    Ok(Json(conversations))
}

/// Conversation detail with a paginated message page, for the owning
/// device.
pub async fn get_device_conversation_detail(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<DetailQuery>,
) -> ApiResult<impl IntoResponse> {
    require_device_session(&state, &query.device_id).await?;

    let conversation = state.conversation_service.get(conversation_id).await?;
    if conversation.device_id != query.device_id {
        return Err(ApiError::Forbidden(
            "Device does not own this conversation".to_string(),
        ));
    }

    let page = state
        .message_service
        .list(conversation_id, query.limit, query.offset, None)
        .await?;

    Ok(Json(ConversationDetailResponse {
        conversation,
        messages: page.messages,
        total_messages: page.count,
    }))
}

/// Admin listing with status/priority/assignment filters.
pub async fn list_admin_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<ConversationStatus>()
                .map_err(ApiError::BadRequest)
        })
        .transpose()?;

    let priority = query
        .priority
        .as_deref()
        .map(|p| p.parse::<Priority>().map_err(ApiError::BadRequest))
        .transpose()?;

    let assigned = match query.assigned.as_deref() {
        Some("assigned") => Some(true),
        Some("unassigned") => Some(false),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Invalid assigned filter: {}",
                other
            )))
        }
        None => None,
    };

    let conversations = state
        .conversation_service
        .list_for_admin(status, priority, assigned, query.assigned_to.as_deref())
        .await?;

    Ok(Json(conversations))
}

pub async fn get_admin_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let conversation = state.conversation_service.get(conversation_id).await?;
    Ok(Json(conversation))
}

/// Assign a conversation to an operator.
pub async fn assign_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
    Json(request): Json<AssignConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let conversation = state
        .conversation_service
        .assign(conversation_id, &request.operator_id)
        .await?;

    Ok(Json(conversation))
}

/// Update conversation status and/or priority.
pub async fn update_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
    Json(request): Json<UpdateConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let conversation = state
        .conversation_service
        .update(conversation_id, request.status, request.priority)
        .await?;

    Ok(Json(conversation))
}

/// Mark a conversation resolved; idempotent.
pub async fn resolve_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let conversation = state
        .conversation_service
        .mark_resolved(conversation_id)
        .await?;

    Ok(Json(conversation))
}

pub async fn conversation_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_operator(&state, &headers).await?;

    let stats = state.conversation_service.stats().await?;
    Ok(Json(stats))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Mobile API
        .route("/api/mobile/conversations/start", post(start_conversation))
        .route("/api/mobile/conversations", get(list_device_conversations))
        .route(
            "/api/mobile/conversations/:id",
            get(get_device_conversation_detail),
        )
        // Admin API
        .route("/api/admin/conversations", get(list_admin_conversations))
        .route("/api/admin/conversations/stats", get(conversation_stats))
        .route("/api/admin/conversations/:id", get(get_admin_conversation))
        .route(
            "/api/admin/conversations/:id/assign",
            post(assign_conversation),
        )
        .route(
            "/api/admin/conversations/:id/status",
            put(update_conversation),
        )
        .route(
            "/api/admin/conversations/:id/resolve",
            post(resolve_conversation),
        )
}
