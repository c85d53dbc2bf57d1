pub mod conversation;
pub mod message;
pub mod notification;
pub mod party;

pub use conversation::*;
pub use message::*;
pub use notification::*;
pub use party::*;

/// Current UTC time as an RFC 3339 string, the storage and wire format for
/// every timestamp in this crate.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap()
}
