use crate::models::ConversationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ConversationStatus,
        to: ConversationStatus,
    },
}

/// Validates a conversation status transition.
///
/// Allowed: new -> active/resolved/closed, active -> resolved/closed,
/// resolved -> closed. Same-state is a no-op. `closed` is terminal and
/// re-opening a resolved conversation is not permitted; a device that comes
/// back after resolution gets a fresh conversation instead.
pub fn validate_transition(
    from: ConversationStatus,
    to: ConversationStatus,
) -> Result<(), TransitionError> {
    use ConversationStatus::*;

    match (from, to) {
        // Same state is always valid (no-op)
        (a, b) if a == b => Ok(()),

        (New, Active) => Ok(()),
        (New, Resolved) => Ok(()),
        (New, Closed) => Ok(()),
        (Active, Resolved) => Ok(()),
        (Active, Closed) => Ok(()),
        (Resolved, Closed) => Ok(()),

        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}
