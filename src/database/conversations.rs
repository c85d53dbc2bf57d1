use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{
    now_rfc3339, Conversation, ConversationStats, ConversationStatus, Priority, SenderKind,
};

fn row_to_conversation(row: &SqliteRow) -> ApiResult<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        assigned_operator_id: row.try_get("assigned_operator_id")?,
        status: ConversationStatus::from(row.try_get::<String, _>("status")?),
        priority: Priority::from(row.try_get::<String, _>("priority")?),
        subject: row.try_get("subject")?,
        last_message: row.try_get("last_message")?,
        last_message_at: row.try_get("last_message_at")?,
        last_message_by: row.try_get("last_message_by")?,
        unread_count_device: row.try_get("unread_count_device")?,
        unread_count_operator: row.try_get("unread_count_operator")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, device_id, assigned_operator_id, status, priority, subject,
        last_message, last_message_at, last_message_by,
        unread_count_device, unread_count_operator, created_at, updated_at";

impl Database {
    /// Insert a conversation in status 'new' with zero unread counters.
    ///
    /// The partial unique index on (device_id) WHERE status IN
    /// ('new','active') makes this fail with a unique violation when the
    /// device already has an open conversation; callers handle that by
    /// re-selecting.
    pub async fn insert_conversation(
        &self,
        device_id: &str,
        subject: &str,
    ) -> ApiResult<Conversation> {
        let now = now_rfc3339();

        let result = sqlx::query(
            "INSERT INTO conversations (device_id, status, priority, subject, created_at, updated_at)
             VALUES (?, 'new', 'medium', ?, ?, ?)",
        )
        .bind(device_id)
        .bind(subject)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();

        tracing::info!("Conversation created: id={}, device_id={}", id, device_id);

        self.get_conversation(id)
            .await?
            .ok_or_else(|| ApiError::Internal("Conversation disappeared after insert".to_string()))
    }

    pub async fn get_conversation(&self, id: i64) -> ApiResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE id = ?",
            CONVERSATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    /// The single open (new or active) conversation for a device, if any.
    pub async fn find_open_conversation(&self, device_id: &str) -> ApiResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations
             WHERE device_id = ? AND status IN ('new', 'active')",
            CONVERSATION_COLUMNS
        ))
        .bind(device_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    pub async fn list_conversations_for_device(
        &self,
        device_id: &str,
    ) -> ApiResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations
             WHERE device_id = ?
             ORDER BY last_message_at DESC, created_at DESC",
            CONVERSATION_COLUMNS
        ))
        .bind(device_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(row_to_conversation).collect()
    }

    /// Admin listing with optional status/priority/assignment filters,
    /// ordered urgent-first then by recency. `assigned_to` narrows to one
    /// operator's conversations.
    pub async fn list_conversations_admin(
        &self,
        status: Option<ConversationStatus>,
        priority: Option<Priority>,
        assigned: Option<bool>,
        assigned_to: Option<&str>,
    ) -> ApiResult<Vec<Conversation>> {
        let mut sql = format!(
            "SELECT {} FROM conversations WHERE 1 = 1",
            CONVERSATION_COLUMNS
        );

        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if priority.is_some() {
            sql.push_str(" AND priority = ?");
        }
        match assigned {
            Some(true) => sql.push_str(" AND assigned_operator_id IS NOT NULL"),
            Some(false) => sql.push_str(" AND assigned_operator_id IS NULL"),
            None => {}
        }
        if assigned_to.is_some() {
            sql.push_str(" AND assigned_operator_id = ?");
        }

        sql.push_str(
            " ORDER BY CASE priority
                 WHEN 'urgent' THEN 0 WHEN 'high' THEN 1
                 WHEN 'medium' THEN 2 ELSE 3 END,
               last_message_at DESC, created_at DESC",
        );

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = priority {
            query = query.bind(priority.as_str());
        }
        if let Some(operator_id) = assigned_to {
            query = query.bind(operator_id);
        }

        let rows = query.fetch_all(self.pool()).await?;
        rows.iter().map(row_to_conversation).collect()
    }

    /// Set the assigned operator and force status to 'active' in one update.
    pub async fn assign_conversation(&self, id: i64, operator_id: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE conversations
             SET assigned_operator_id = ?, status = 'active', updated_at = ?
             WHERE id = ?",
        )
        .bind(operator_id)
        .bind(now_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn update_conversation_fields(
        &self,
        id: i64,
        status: Option<ConversationStatus>,
        priority: Option<Priority>,
    ) -> ApiResult<Conversation> {
        let mut sql = "UPDATE conversations SET updated_at = ?".to_string();
        if status.is_some() {
            sql.push_str(", status = ?");
        }
        if priority.is_some() {
            sql.push_str(", priority = ?");
        }
        sql.push_str(" WHERE id = ?");

        let mut query = sqlx::query(&sql).bind(now_rfc3339());
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = priority {
            query = query.bind(priority.as_str());
        }
        query = query.bind(id);

        query.execute(self.pool()).await?;

        self.get_conversation(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))
    }

    /// Fold a freshly appended message into the conversation: refresh the
    /// denormalized last-message fields and increment the recipient party's
    /// unread counter, all in a single statement so concurrent appends never
    /// lose an increment.
    pub async fn apply_message_to_conversation(
        &self,
        id: i64,
        preview: &str,
        sent_at: &str,
        last_message_by: &str,
        recipient: SenderKind,
    ) -> ApiResult<()> {
        let counter = match recipient {
            SenderKind::Device => "unread_count_device",
            SenderKind::Operator => "unread_count_operator",
        };

        let sql = format!(
            "UPDATE conversations
             SET last_message = ?, last_message_at = ?, last_message_by = ?,
                 updated_at = ?, {counter} = {counter} + 1
             WHERE id = ?"
        );

        sqlx::query(&sql)
            .bind(preview)
            .bind(sent_at)
            .bind(last_message_by)
            .bind(now_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Decrement one party's unread counter, floored at zero.
    pub async fn decrement_unread(&self, id: i64, party: SenderKind) -> ApiResult<()> {
        let counter = match party {
            SenderKind::Device => "unread_count_device",
            SenderKind::Operator => "unread_count_operator",
        };

        let sql = format!(
            "UPDATE conversations SET {counter} = MAX({counter} - 1, 0) WHERE id = ?"
        );

        sqlx::query(&sql).bind(id).execute(self.pool()).await?;

        Ok(())
    }

    pub async fn reset_unread(&self, id: i64, party: SenderKind) -> ApiResult<()> {
        let counter = match party {
            SenderKind::Device => "unread_count_device",
            SenderKind::Operator => "unread_count_operator",
        };

        let sql = format!("UPDATE conversations SET {counter} = 0 WHERE id = ?");

        sqlx::query(&sql).bind(id).execute(self.pool()).await?;

        Ok(())
    }

    pub async fn conversation_stats(&self) -> ApiResult<ConversationStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    SUM(CASE WHEN status = 'new' THEN 1 ELSE 0 END) AS new_count,
                    SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END) AS active_count,
                    SUM(CASE WHEN status = 'resolved' THEN 1 ELSE 0 END) AS resolved_count,
                    SUM(CASE WHEN assigned_operator_id IS NULL THEN 1 ELSE 0 END) AS unassigned_count,
                    SUM(CASE WHEN priority = 'urgent' THEN 1 ELSE 0 END) AS urgent_count
             FROM conversations",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(ConversationStats {
            total_conversations: row.try_get("total")?,
            new_conversations: row.try_get::<Option<i64>, _>("new_count")?.unwrap_or(0),
            active_conversations: row.try_get::<Option<i64>, _>("active_count")?.unwrap_or(0),
            resolved_conversations: row.try_get::<Option<i64>, _>("resolved_count")?.unwrap_or(0),
            unassigned_conversations: row
                .try_get::<Option<i64>, _>("unassigned_count")?
                .unwrap_or(0),
            urgent_conversations: row.try_get::<Option<i64>, _>("urgent_count")?.unwrap_or(0),
        })
    }
}
