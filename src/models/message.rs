use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::SenderKind;

/// Maximum accepted message content length, in characters.
pub const MAX_CONTENT_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    File,
    Location,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::File => "file",
            MessageKind::Location => "location",
        }
    }

    /// Kinds whose payload is a media object rather than plain text.
    pub fn is_media(&self) -> bool {
        matches!(self, MessageKind::Image | MessageKind::Voice | MessageKind::File)
    }
}

impl From<String> for MessageKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "image" => MessageKind::Image,
            "voice" => MessageKind::Voice,
            "file" => MessageKind::File,
            "location" => MessageKind::Location,
            _ => MessageKind::Text,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery state of a message. Transitions are forward-only:
/// sent -> delivered -> read, with read reachable directly from sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }
}

impl From<String> for MessageStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            "failed" => MessageStatus::Failed,
            _ => MessageStatus::Sent,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Individual message within a conversation. Append-only; only `status`,
/// `delivered_at` and `read_at` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_kind: SenderKind,
    /// Operator id for operator messages; always None for device messages.
    pub sender_id: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub media_url: String,
    pub status: MessageStatus,
    pub is_urgent: bool,
    pub metadata: serde_json::Value,
    pub sent_at: String,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

impl Message {
    /// Validate content/kind/media combinations before anything is written.
    ///
    /// Rules: content is capped at MAX_CONTENT_LEN characters; text messages
    /// need content unless a media URL stands in for it; media kinds need a
    /// media URL; location messages need content (the coordinates ride in
    /// the metadata bag).
    pub fn validate(content: &str, kind: MessageKind, media_url: &str) -> Result<(), String> {
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(format!(
                "Message content exceeds {} characters",
                MAX_CONTENT_LEN
            ));
        }

        match kind {
            MessageKind::Text => {
                if content.trim().is_empty() && media_url.is_empty() {
                    return Err("Message content cannot be empty".to_string());
                }
            }
            MessageKind::Image | MessageKind::Voice | MessageKind::File => {
                if media_url.is_empty() {
                    return Err(format!("{} messages require a media URL", kind));
                }
            }
            MessageKind::Location => {
                if content.trim().is_empty() {
                    return Err("Location messages require content".to_string());
                }
            }
        }

        Ok(())
    }
}

// Request DTOs

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_kind")]
    pub kind: MessageKind,
    #[serde(default)]
    pub media_url: String,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_kind() -> MessageKind {
    MessageKind::Text
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageStatusRequest {
    pub status: MessageStatus,
}

// Response DTOs

#[derive(Debug, Clone, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub count: i64,
}
