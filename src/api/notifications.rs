use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{require_operator, ApiResult, AppState};
use crate::models::NotificationListResponse;

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub count: i64,
}

/// Unread notifications for the calling operator, newest first.
pub async fn list_unread_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let operator = require_operator(&state, &headers).await?;

    let notifications = state
        .notification_service
        .list_unread(&operator.id)
        .await?;

    let total = notifications.len() as i64;

    Ok(Json(NotificationListResponse {
        notifications,
        total,
    }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let operator = require_operator(&state, &headers).await?;

    let notification = state
        .notification_service
        .mark_read(notification_id, &operator.id)
        .await?;

    Ok(Json(notification))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let operator = require_operator(&state, &headers).await?;

    let count = state.notification_service.mark_all_read(&operator.id).await?;

    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked as read".to_string(),
        count,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/notifications/unread",
            get(list_unread_notifications),
        )
        .route(
            "/api/admin/notifications/:id/read",
            post(mark_notification_read),
        )
        .route(
            "/api/admin/notifications/read-all",
            post(mark_all_notifications_read),
        )
}
