use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Message;

/// Number of characters of a message kept as the conversation's list-view
/// preview.
pub const LAST_MESSAGE_PREVIEW_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    New,
    Active,
    Resolved,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::New => "new",
            ConversationStatus::Active => "active",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Closed => "closed",
        }
    }

    /// Statuses in which a device may keep using the conversation.
    pub fn is_open(&self) -> bool {
        matches!(self, ConversationStatus::New | ConversationStatus::Active)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for ConversationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => ConversationStatus::Active,
            "resolved" => ConversationStatus::Resolved,
            "closed" => ConversationStatus::Closed,
            _ => ConversationStatus::New,
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ConversationStatus::New),
            "active" => Ok(ConversationStatus::Active),
            "resolved" => Ok(ConversationStatus::Resolved),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(format!("Invalid conversation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Invalid priority: {}", other)),
        }
    }
}

/// Emergency chat conversation between a mobile device and an operator.
///
/// Carries denormalized last-message fields for list views and two
/// independent unread counters, one per party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub device_id: String,
    pub assigned_operator_id: Option<String>,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub subject: String,
    pub last_message: String,
    pub last_message_at: Option<String>,
    pub last_message_by: Option<String>,
    pub unread_count_device: i64,
    pub unread_count_operator: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Truncate message content to the stored list-view preview.
pub fn message_preview(content: &str) -> String {
    content.chars().take(LAST_MESSAGE_PREVIEW_LEN).collect()
}

// Request DTOs

#[derive(Debug, Clone, Deserialize)]
pub struct StartConversationRequest {
    pub device_id: String,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignConversationRequest {
    pub operator_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConversationRequest {
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
}

// Response DTOs

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetailResponse {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub total_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub total_conversations: i64,
    pub new_conversations: i64,
    pub active_conversations: i64,
    pub resolved_conversations: i64,
    pub unassigned_conversations: i64,
    pub urgent_conversations: i64,
}
