use sqlx::Row;

use crate::api::middleware::error::ApiResult;
use crate::database::Database;
use crate::models::{now_rfc3339, DeviceSession, Operator};

impl Database {
    // Device session lookup (external collaborator surface)

    pub async fn get_device_session(&self, device_id: &str) -> ApiResult<Option<DeviceSession>> {
        let row = sqlx::query(
            "SELECT device_id, is_active, notification_enabled, created_at
             FROM device_sessions
             WHERE device_id = ?",
        )
        .bind(device_id)
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = row {
            Ok(Some(DeviceSession {
                device_id: row.try_get("device_id")?,
                is_active: row.try_get::<i64, _>("is_active")? != 0,
                notification_enabled: row.try_get::<i64, _>("notification_enabled")? != 0,
                created_at: row.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Active session for a device, or None if unknown or deactivated.
    pub async fn get_active_device_session(
        &self,
        device_id: &str,
    ) -> ApiResult<Option<DeviceSession>> {
        Ok(self
            .get_device_session(device_id)
            .await?
            .filter(|s| s.is_active))
    }

    pub async fn create_device_session(&self, device_id: &str) -> ApiResult<DeviceSession> {
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO device_sessions (device_id, is_active, notification_enabled, created_at)
             VALUES (?, 1, 1, ?)",
        )
        .bind(device_id)
        .bind(&now)
        .execute(self.pool())
        .await?;

        Ok(DeviceSession {
            device_id: device_id.to_string(),
            is_active: true,
            notification_enabled: true,
            created_at: now,
        })
    }

    // Operator directory (external collaborator surface)

    pub async fn get_operator(&self, operator_id: &str) -> ApiResult<Option<Operator>> {
        let row = sqlx::query(
            "SELECT id, display_name, is_staff, is_active, created_at
             FROM operators
             WHERE id = ?",
        )
        .bind(operator_id)
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = row {
            Ok(Some(Operator {
                id: row.try_get("id")?,
                display_name: row.try_get("display_name")?,
                is_staff: row.try_get::<i64, _>("is_staff")? != 0,
                is_active: row.try_get::<i64, _>("is_active")? != 0,
                created_at: row.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn create_operator(
        &self,
        operator_id: &str,
        display_name: &str,
        is_staff: bool,
    ) -> ApiResult<Operator> {
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO operators (id, display_name, is_staff, is_active, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(operator_id)
        .bind(display_name)
        .bind(is_staff as i64)
        .bind(&now)
        .execute(self.pool())
        .await?;

        Ok(Operator {
            id: operator_id.to_string(),
            display_name: display_name.to_string(),
            is_staff,
            is_active: true,
            created_at: now,
        })
    }

    /// Load balancing query for auto-assignment: among staff, active
    /// operators with fewer than `cap` conversations currently in status
    /// 'active', pick the least loaded; ties broken by operator id
    /// ascending. Evaluated live on every call so the counts never drift.
    pub async fn least_loaded_operator(&self, cap: i64) -> ApiResult<Option<Operator>> {
        let row = sqlx::query(
            "SELECT o.id, o.display_name, o.is_staff, o.is_active, o.created_at,
                    COUNT(c.id) AS active_count
             FROM operators o
             LEFT JOIN conversations c
                    ON c.assigned_operator_id = o.id AND c.status = 'active'
             WHERE o.is_staff = 1 AND o.is_active = 1
             GROUP BY o.id
             HAVING COUNT(c.id) < ?
             ORDER BY active_count ASC, o.id ASC
             LIMIT 1",
        )
        .bind(cap)
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = row {
            Ok(Some(Operator {
                id: row.try_get("id")?,
                display_name: row.try_get("display_name")?,
                is_staff: row.try_get::<i64, _>("is_staff")? != 0,
                is_active: row.try_get::<i64, _>("is_active")? != 0,
                created_at: row.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }
}
