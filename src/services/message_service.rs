use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{
    message_preview, now_rfc3339, ConversationStatus, Message, MessageListResponse,
    NewNotification, SenderKind, SendMessageRequest,
};
use crate::services::conversation_service::ConversationService;
use crate::services::notification_service::NotificationService;

/// Message creation and the delivery-status pipeline. Every counter and
/// status mutation goes through a conditional store update, never a
/// read-modify-write in this layer.
#[derive(Clone)]
pub struct MessageService {
    db: Database,
    conversation_service: ConversationService,
    notification_service: NotificationService,
}

impl MessageService {
    pub fn new(
        db: Database,
        conversation_service: ConversationService,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            db,
            conversation_service,
            notification_service,
        }
    }

    /// Append a message to a conversation.
    ///
    /// The sequence is deliberate and explicit: validate, persist the
    /// message, fold it into the conversation (denormalized last-message
    /// fields plus the other party's unread counter, one statement), then
    /// run the assignment trigger and notification side effects.
    pub async fn create(
        &self,
        conversation_id: i64,
        sender_kind: SenderKind,
        sender_id: Option<String>,
        request: SendMessageRequest,
    ) -> ApiResult<Message> {
        Message::validate(&request.content, request.kind, &request.media_url)
            .map_err(ApiError::BadRequest)?;

        if sender_kind == SenderKind::Operator && sender_id.is_none() {
            return Err(ApiError::BadRequest(
                "Operator messages must carry an operator identity".to_string(),
            ));
        }

        let conversation = self.conversation_service.get(conversation_id).await?;

        let sent_at = now_rfc3339();
        let message = self
            .db
            .insert_message(
                conversation_id,
                sender_kind,
                sender_id.as_deref(),
                &request.content,
                request.kind,
                &request.media_url,
                request.is_urgent,
                &request.metadata,
                &sent_at,
            )
            .await?;

        let last_message_by = match sender_kind {
            SenderKind::Device => "device".to_string(),
            SenderKind::Operator => sender_id.clone().unwrap_or_default(),
        };

        self.db
            .apply_message_to_conversation(
                conversation_id,
                &message_preview(&message.content),
                &sent_at,
                &last_message_by,
                sender_kind.other(),
            )
            .await?;

        tracing::info!(
            "Message created: id={}, conversation={}, sender={}",
            message.id,
            conversation_id,
            sender_kind
        );

        // First device message on an untouched conversation kicks off
        // load-balanced assignment; if everyone is at capacity the
        // conversation just stays unassigned and the next message retries.
        let assigned_operator_id = if sender_kind == SenderKind::Device
            && conversation.status == ConversationStatus::New
            && conversation.assigned_operator_id.is_none()
        {
            self.conversation_service
                .auto_assign(conversation_id)
                .await?
                .map(|op| op.id)
        } else {
            conversation.assigned_operator_id.clone()
        };

        if sender_kind == SenderKind::Device {
            if let Some(operator_id) = assigned_operator_id {
                let preview = message_preview(&message.content);
                self.notification_service
                    .notify(NewNotification::new_message(
                        operator_id.clone(),
                        conversation_id,
                        message.id,
                        &preview,
                    ))
                    .await?;

                if message.is_urgent {
                    self.notification_service
                        .notify(NewNotification::urgent_message(
                            operator_id,
                            conversation_id,
                            message.id,
                            &preview,
                        ))
                        .await?;
                }
            }
        }

        Ok(message)
    }

    pub async fn get(&self, message_id: i64) -> ApiResult<Message> {
        self.db
            .get_message(message_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))
    }

    pub async fn list(
        &self,
        conversation_id: i64,
        limit: i64,
        offset: i64,
        after: Option<i64>,
    ) -> ApiResult<MessageListResponse> {
        self.conversation_service.get(conversation_id).await?;

        let (messages, count) = self
            .db
            .list_messages(conversation_id, limit, offset, after)
            .await?;

        Ok(MessageListResponse {
            messages,
            count,
            limit,
            offset,
        })
    }

    /// sent -> delivered. Returns the message and whether this call made
    /// the transition; anything past 'sent' is left untouched.
    pub async fn mark_delivered(&self, message_id: i64) -> ApiResult<(Message, bool)> {
        self.get(message_id).await?;

        let changed = self
            .db
            .mark_message_delivered(message_id, &now_rfc3339())
            .await?;

        let message = self.get(message_id).await?;
        Ok((message, changed))
    }

    /// {sent,delivered} -> read. The store update is a compare-and-set, so
    /// of two racing readers exactly one observes the transition and the
    /// unread counter is decremented exactly once.
    pub async fn mark_read(&self, message_id: i64) -> ApiResult<(Message, bool)> {
        let message = self.get(message_id).await?;

        let changed = self.db.mark_message_read(message_id, &now_rfc3339()).await?;

        if changed {
            // A device message being read decrements the operator counter
            // and vice versa: the reader is the message's other party.
            self.db
                .decrement_unread(message.conversation_id, message.sender_kind.other())
                .await?;
        }

        let message = self.get(message_id).await?;
        Ok((message, changed))
    }

    /// Batch read-receipt path: marks each listed message of this
    /// conversation read, returns how many actually transitioned.
    pub async fn mark_read_many(
        &self,
        conversation_id: i64,
        message_ids: &[i64],
    ) -> ApiResult<i64> {
        let mut count = 0;

        for &message_id in message_ids {
            let Some(message) = self.db.get_message(message_id).await? else {
                continue;
            };
            if message.conversation_id != conversation_id {
                continue;
            }

            let changed = self.db.mark_message_read(message_id, &now_rfc3339()).await?;
            if changed {
                self.db
                    .decrement_unread(conversation_id, message.sender_kind.other())
                    .await?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// Bulk-read everything the viewer hasn't read yet (messages authored
    /// by the other party) and reset the viewer's unread counter. The
    /// message sweep is a single conditional update, so it composes with
    /// concurrent single-message mark_read calls without double counting.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: i64,
        viewer: SenderKind,
    ) -> ApiResult<i64> {
        self.conversation_service.get(conversation_id).await?;

        let count = self
            .db
            .mark_conversation_messages_read(conversation_id, viewer.other(), &now_rfc3339())
            .await?;

        self.db.reset_unread(conversation_id, viewer).await?;

        tracing::info!(
            "Marked {} messages read in conversation {} for {}",
            count,
            conversation_id,
            viewer
        );

        Ok(count)
    }
}
