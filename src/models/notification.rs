use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    ConversationAssigned,
    UrgentMessage,
    ConversationResolved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewMessage => "new_message",
            NotificationKind::ConversationAssigned => "conversation_assigned",
            NotificationKind::UrgentMessage => "urgent_message",
            NotificationKind::ConversationResolved => "conversation_resolved",
        }
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "conversation_assigned" => NotificationKind::ConversationAssigned,
            "urgent_message" => NotificationKind::UrgentMessage,
            "conversation_resolved" => NotificationKind::ConversationResolved,
            _ => NotificationKind::NewMessage,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-operator notification record for a chat event. `is_read` only ever
/// moves false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub operator_id: String,
    pub kind: NotificationKind,
    pub conversation_id: i64,
    pub message_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Fields for a notification about to be persisted.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub operator_id: String,
    pub kind: NotificationKind,
    pub conversation_id: i64,
    pub message_id: Option<i64>,
    pub title: String,
    pub body: String,
}

impl NewNotification {
    pub fn assignment(operator_id: String, conversation_id: i64) -> Self {
        Self {
            operator_id,
            kind: NotificationKind::ConversationAssigned,
            conversation_id,
            message_id: None,
            title: "New conversation assigned".to_string(),
            body: format!("You have been assigned to conversation {}", conversation_id),
        }
    }

    pub fn new_message(operator_id: String, conversation_id: i64, message_id: i64, preview: &str) -> Self {
        Self {
            operator_id,
            kind: NotificationKind::NewMessage,
            conversation_id,
            message_id: Some(message_id),
            title: "New message".to_string(),
            body: preview.to_string(),
        }
    }

    pub fn urgent_message(operator_id: String, conversation_id: i64, message_id: i64, preview: &str) -> Self {
        Self {
            operator_id,
            kind: NotificationKind::UrgentMessage,
            conversation_id,
            message_id: Some(message_id),
            title: "Urgent message".to_string(),
            body: preview.to_string(),
        }
    }

    pub fn resolved(operator_id: String, conversation_id: i64) -> Self {
        Self {
            operator_id,
            kind: NotificationKind::ConversationResolved,
            conversation_id,
            message_id: None,
            title: "Conversation resolved".to_string(),
            body: format!("Conversation {} has been resolved", conversation_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub total: i64,
}
