use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{
    Conversation, ConversationStats, ConversationStatus, NewNotification, Operator, Priority,
};
use crate::services::notification_service::NotificationService;
use crate::services::state_machine::validate_transition;

/// Conversation lifecycle: creation and dedup, operator assignment and
/// load balancing, status transitions.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    notification_service: NotificationService,
    operator_active_cap: i64,
}

impl ConversationService {
    pub fn new(
        db: Database,
        notification_service: NotificationService,
        operator_active_cap: i64,
    ) -> Self {
        Self {
            db,
            notification_service,
            operator_active_cap,
        }
    }

    /// Return the device's single open conversation, creating one in status
    /// 'new' if none exists. The bool is true when this call created it.
    ///
    /// Safe under concurrent calls for the same device: the store's partial
    /// unique index allows only one open conversation per device, so the
    /// losing inserter re-selects the winner's row.
    pub async fn get_or_create(
        &self,
        device_id: &str,
        subject: &str,
    ) -> ApiResult<(Conversation, bool)> {
        self.db
            .get_active_device_session(device_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Invalid or inactive device".to_string()))?;

        if let Some(existing) = self.db.find_open_conversation(device_id).await? {
            return Ok((existing, false));
        }

        match self.db.insert_conversation(device_id, subject).await {
            Ok(conversation) => Ok((conversation, true)),
            Err(ApiError::Conflict(_)) => {
                // Lost the insert race; the open conversation now exists.
                let existing = self
                    .db
                    .find_open_conversation(device_id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::Internal("Open conversation vanished after conflict".to_string())
                    })?;
                Ok((existing, false))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get(&self, conversation_id: i64) -> ApiResult<Conversation> {
        self.db
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))
    }

    /// Assign an operator, forcing the conversation to 'active'. Fails with
    /// a state conflict when the target is not active staff or the
    /// conversation can no longer be activated; nothing is mutated on
    /// failure. Reassignment overwrites the previous operator.
    pub async fn assign(&self, conversation_id: i64, operator_id: &str) -> ApiResult<Conversation> {
        let conversation = self.get(conversation_id).await?;

        let operator = self
            .db
            .get_operator(operator_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Operator not found".to_string()))?;

        if !operator.is_staff || !operator.is_active {
            return Err(ApiError::Conflict(
                "Only active staff operators can be assigned to conversations".to_string(),
            ));
        }

        validate_transition(conversation.status, ConversationStatus::Active)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;

        self.db
            .assign_conversation(conversation_id, &operator.id)
            .await?;

        tracing::info!(
            "Conversation {} assigned to operator {}",
            conversation_id,
            operator.id
        );

        self.notification_service
            .notify(NewNotification::assignment(
                operator.id.clone(),
                conversation_id,
            ))
            .await?;

        self.get(conversation_id).await
    }

    /// Pick the least-loaded eligible operator and assign them. Eligibility
    /// is re-evaluated against the store on every call: active staff with
    /// fewer than the cap of currently-active conversations, ties broken by
    /// operator id. Returns None, leaving the conversation unassigned, when
    /// everyone is at capacity; that is a valid outcome, not an error.
    pub async fn auto_assign(&self, conversation_id: i64) -> ApiResult<Option<Operator>> {
        let candidate = self
            .db
            .least_loaded_operator(self.operator_active_cap)
            .await?;

        match candidate {
            Some(operator) => {
                self.assign(conversation_id, &operator.id).await?;
                Ok(Some(operator))
            }
            None => {
                tracing::info!(
                    "No operator below the active cap; conversation {} stays unassigned",
                    conversation_id
                );
                Ok(None)
            }
        }
    }

    /// Resolve a conversation. Resolving an already-resolved conversation
    /// is a no-op, not an error; the resolved notification goes out only on
    /// the first transition.
    pub async fn mark_resolved(&self, conversation_id: i64) -> ApiResult<Conversation> {
        let conversation = self.get(conversation_id).await?;

        if conversation.status == ConversationStatus::Resolved {
            return Ok(conversation);
        }

        validate_transition(conversation.status, ConversationStatus::Resolved)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;

        let updated = self
            .db
            .update_conversation_fields(conversation_id, Some(ConversationStatus::Resolved), None)
            .await?;

        tracing::info!("Conversation {} resolved", conversation_id);

        if let Some(operator_id) = &updated.assigned_operator_id {
            self.notification_service
                .notify(NewNotification::resolved(
                    operator_id.clone(),
                    conversation_id,
                ))
                .await?;
        }

        Ok(updated)
    }

    /// Admin status/priority update with transition validation.
    pub async fn update(
        &self,
        conversation_id: i64,
        status: Option<ConversationStatus>,
        priority: Option<Priority>,
    ) -> ApiResult<Conversation> {
        let conversation = self.get(conversation_id).await?;

        if let Some(to) = status {
            validate_transition(conversation.status, to)
                .map_err(|e| ApiError::Conflict(e.to_string()))?;
        }

        if status.is_none() && priority.is_none() {
            return Err(ApiError::BadRequest(
                "Nothing to update: provide status and/or priority".to_string(),
            ));
        }

        let updated = self
            .db
            .update_conversation_fields(conversation_id, status, priority)
            .await?;

        tracing::info!(
            "Conversation {} updated: status={}, priority={}",
            conversation_id,
            updated.status,
            updated.priority
        );

        Ok(updated)
    }

    pub async fn list_for_device(&self, device_id: &str) -> ApiResult<Vec<Conversation>> {
        self.db
            .get_active_device_session(device_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Invalid or inactive device".to_string()))?;

        self.db.list_conversations_for_device(device_id).await
    }

    pub async fn list_for_admin(
        &self,
        status: Option<ConversationStatus>,
        priority: Option<Priority>,
        assigned: Option<bool>,
        assigned_to: Option<&str>,
    ) -> ApiResult<Vec<Conversation>> {
        self.db
            .list_conversations_admin(status, priority, assigned, assigned_to)
            .await
    }

    pub async fn stats(&self) -> ApiResult<ConversationStats> {
        self.db.conversation_stats().await
    }
}
