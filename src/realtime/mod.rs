pub mod events;
pub mod hub;
pub mod session;

pub use events::*;
pub use hub::*;
pub use session::{ChatParty, ConnectAuth};
