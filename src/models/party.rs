use serde::{Deserialize, Serialize};

/// A mobile installation's identity, keyed by its opaque device identifier.
/// Chat joins and conversation ownership resolve against this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    pub device_id: String,
    pub is_active: bool,
    pub notification_enabled: bool,
    pub created_at: String,
}

/// A staff user who handles conversations on the administrative side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub created_at: String,
}

/// Which side of a conversation an actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    Device,
    Operator,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Device => "device",
            SenderKind::Operator => "operator",
        }
    }

    /// The party on the other side of the conversation.
    pub fn other(&self) -> SenderKind {
        match self {
            SenderKind::Device => SenderKind::Operator,
            SenderKind::Operator => SenderKind::Device,
        }
    }
}

impl From<String> for SenderKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "operator" => SenderKind::Operator,
            _ => SenderKind::Device,
        }
    }
}

impl std::fmt::Display for SenderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
