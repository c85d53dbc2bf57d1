use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageKind, MessageStatus, Notification, SenderKind};

/// Inbound frames on a chat socket. JSON with a `type` discriminator;
/// anything that fails to parse is answered with an error frame and never
/// reaches the room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    ChatMessage {
        #[serde(default)]
        content: String,
        #[serde(default = "default_message_kind")]
        message_type: MessageKind,
        #[serde(default)]
        media_url: String,
        #[serde(default)]
        is_urgent: bool,
        #[serde(default = "default_metadata")]
        metadata: serde_json::Value,
    },
    MessageStatus {
        message_id: i64,
        status: MessageStatus,
    },
    TypingIndicator {
        #[serde(default)]
        is_typing: bool,
    },
    ReadReceipt {
        message_ids: Vec<i64>,
    },
}

/// Inbound frames on a notification socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationFrame {
    MarkRead { notification_id: i64 },
}

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

/// Everything a session can emit to a live connection, for both chat rooms
/// and operator notification rooms.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    ConnectionEstablished {
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        operator_id: Option<String>,
        timestamp: String,
    },
    ChatMessage {
        message: Message,
    },
    MessageStatusUpdate {
        message_id: i64,
        status: MessageStatus,
        timestamp: String,
    },
    TypingIndicator {
        sender_kind: SenderKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        is_typing: bool,
        timestamp: String,
    },
    ReadReceipt {
        sender_kind: SenderKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        message_ids: Vec<i64>,
        count: i64,
        timestamp: String,
    },
    UserJoined {
        sender_kind: SenderKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        timestamp: String,
    },
    UserLeft {
        sender_kind: SenderKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        timestamp: String,
    },
    Notification {
        notification: Notification,
    },
    NotificationMarkedRead {
        notification_id: i64,
        timestamp: String,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            message: message.into(),
        }
    }

    /// Wire encoding of the event. Serialization of these variants cannot
    /// fail in practice; fall back to an empty object rather than dropping
    /// the connection.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize outbound event: {}", e);
            "{}".to_string()
        })
    }
}
