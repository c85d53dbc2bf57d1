use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{now_rfc3339, NewNotification, Notification, NotificationKind};

fn row_to_notification(row: &SqliteRow) -> ApiResult<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        operator_id: row.try_get("operator_id")?,
        kind: NotificationKind::from(row.try_get::<String, _>("kind")?),
        conversation_id: row.try_get("conversation_id")?,
        message_id: row.try_get("message_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        is_read: row.try_get::<i64, _>("is_read")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

const NOTIFICATION_COLUMNS: &str =
    "id, operator_id, kind, conversation_id, message_id, title, body, is_read, created_at";

impl Database {
    pub async fn insert_notification(&self, new: &NewNotification) -> ApiResult<Notification> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "INSERT INTO notifications (operator_id, kind, conversation_id, message_id,
                                        title, body, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&new.operator_id)
        .bind(new.kind.as_str())
        .bind(new.conversation_id)
        .bind(new.message_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(&now)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();

        self.get_notification(id)
            .await?
            .ok_or_else(|| ApiError::Internal("Notification disappeared after insert".to_string()))
    }

    pub async fn get_notification(&self, id: i64) -> ApiResult<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_notification).transpose()
    }

    /// Unread notifications for an operator, newest first.
    pub async fn list_unread_notifications(
        &self,
        operator_id: &str,
    ) -> ApiResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications
             WHERE operator_id = ? AND is_read = 0
             ORDER BY created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(operator_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    /// One-way false -> true; repeat calls affect zero rows.
    pub async fn mark_notification_read(&self, id: i64) -> ApiResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_all_notifications_read(&self, operator_id: &str) -> ApiResult<i64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE operator_id = ? AND is_read = 0")
                .bind(operator_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() as i64)
    }
}
