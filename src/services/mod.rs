pub mod conversation_service;
pub mod message_service;
pub mod notification_service;
pub mod state_machine;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use state_machine::{validate_transition, TransitionError};
