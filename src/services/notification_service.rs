use std::sync::Arc;

use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{NewNotification, Notification};
use crate::realtime::{OutboundEvent, RealtimeHub, RoomKey};

/// Persists per-operator notification records and pushes them onto the
/// operator's live notification room. A push to an operator with no open
/// connection is simply dropped; the record is still there for the unread
/// listing.
#[derive(Clone)]
pub struct NotificationService {
    db: Database,
    hub: Arc<RealtimeHub>,
}

impl NotificationService {
    pub fn new(db: Database, hub: Arc<RealtimeHub>) -> Self {
        Self { db, hub }
    }

    pub async fn notify(&self, new: NewNotification) -> ApiResult<Notification> {
        let notification = self.db.insert_notification(&new).await?;

        tracing::info!(
            "Notification created: id={}, operator={}, kind={}",
            notification.id,
            notification.operator_id,
            notification.kind
        );

        self.hub
            .broadcast(
                &RoomKey::Operator(notification.operator_id.clone()),
                OutboundEvent::Notification {
                    notification: notification.clone(),
                },
            )
            .await;

        Ok(notification)
    }

    /// Unread notifications for an operator, newest first.
    pub async fn list_unread(&self, operator_id: &str) -> ApiResult<Vec<Notification>> {
        self.db.list_unread_notifications(operator_id).await
    }

    /// Mark one notification read. Only the owning operator may do this;
    /// marking an already-read notification is a no-op.
    pub async fn mark_read(&self, notification_id: i64, operator_id: &str) -> ApiResult<Notification> {
        let notification = self
            .db
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

        if notification.operator_id != operator_id {
            return Err(ApiError::Forbidden(
                "Cannot mark another operator's notification as read".to_string(),
            ));
        }

        self.db.mark_notification_read(notification_id).await?;

        self.db
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Notification disappeared".to_string()))
    }

    /// Mark everything unread for an operator; returns how many flipped.
    pub async fn mark_all_read(&self, operator_id: &str) -> ApiResult<i64> {
        self.db.mark_all_notifications_read(operator_id).await
    }
}
