use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{Message, MessageKind, MessageStatus, SenderKind};

fn row_to_message(row: &SqliteRow) -> ApiResult<Message> {
    let metadata: String = row.try_get("metadata")?;

    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_kind: SenderKind::from(row.try_get::<String, _>("sender_kind")?),
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        kind: MessageKind::from(row.try_get::<String, _>("kind")?),
        media_url: row.try_get("media_url")?,
        status: MessageStatus::from(row.try_get::<String, _>("status")?),
        is_urgent: row.try_get::<i64, _>("is_urgent")? != 0,
        metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| serde_json::json!({})),
        sent_at: row.try_get("sent_at")?,
        delivered_at: row.try_get("delivered_at")?,
        read_at: row.try_get("read_at")?,
    })
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_kind, sender_id, content, kind,
        media_url, status, is_urgent, metadata, sent_at, delivered_at, read_at";

#[allow(clippy::too_many_arguments)]
impl Database {
    pub async fn insert_message(
        &self,
        conversation_id: i64,
        sender_kind: SenderKind,
        sender_id: Option<&str>,
        content: &str,
        kind: MessageKind,
        media_url: &str,
        is_urgent: bool,
        metadata: &serde_json::Value,
        sent_at: &str,
    ) -> ApiResult<Message> {
        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, sender_kind, sender_id, content, kind,
                                   media_url, status, is_urgent, metadata, sent_at)
             VALUES (?, ?, ?, ?, ?, ?, 'sent', ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(sender_kind.as_str())
        .bind(sender_id)
        .bind(content)
        .bind(kind.as_str())
        .bind(media_url)
        .bind(is_urgent as i64)
        .bind(metadata.to_string())
        .bind(sent_at)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();

        self.get_message(id)
            .await?
            .ok_or_else(|| ApiError::Internal("Message disappeared after insert".to_string()))
    }

    pub async fn get_message(&self, id: i64) -> ApiResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    /// Messages for a conversation in creation order, with an optional
    /// `after` id cursor for reconnect catch-up.
    pub async fn list_messages(
        &self,
        conversation_id: i64,
        limit: i64,
        offset: i64,
        after: Option<i64>,
    ) -> ApiResult<(Vec<Message>, i64)> {
        let mut sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ?",
            MESSAGE_COLUMNS
        );
        let mut count_sql = "SELECT COUNT(*) FROM messages WHERE conversation_id = ?".to_string();

        if after.is_some() {
            sql.push_str(" AND id > ?");
            count_sql.push_str(" AND id > ?");
        }

        sql.push_str(" ORDER BY sent_at ASC, id ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(conversation_id);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(conversation_id);

        if let Some(after) = after {
            query = query.bind(after);
            count_query = count_query.bind(after);
        }

        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        let total = count_query.fetch_one(self.pool()).await?;

        let messages = rows.iter().map(row_to_message).collect::<ApiResult<_>>()?;

        Ok((messages, total))
    }

    /// Conditional sent -> delivered transition. Returns true when this call
    /// performed the transition; false when the message was already past
    /// 'sent' (no-op, and the timestamp is left alone).
    pub async fn mark_message_delivered(&self, id: i64, delivered_at: &str) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE messages SET status = 'delivered', delivered_at = ?
             WHERE id = ? AND status = 'sent'",
        )
        .bind(delivered_at)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Conditional {sent,delivered} -> read transition; compare-and-set so
    /// two racing readers produce exactly one transition.
    pub async fn mark_message_read(&self, id: i64, read_at: &str) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE messages SET status = 'read', read_at = ?
             WHERE id = ? AND status IN ('sent', 'delivered')",
        )
        .bind(read_at)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Bulk-read every not-yet-read message authored by `sender_kind` in a
    /// conversation. Returns the number of messages that actually
    /// transitioned, which is 0 on a repeat call.
    pub async fn mark_conversation_messages_read(
        &self,
        conversation_id: i64,
        sender_kind: SenderKind,
        read_at: &str,
    ) -> ApiResult<i64> {
        let result = sqlx::query(
            "UPDATE messages SET status = 'read', read_at = ?
             WHERE conversation_id = ? AND sender_kind = ?
               AND status IN ('sent', 'delivered')",
        )
        .bind(read_at)
        .bind(conversation_id)
        .bind(sender_kind.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() as i64)
    }
}
