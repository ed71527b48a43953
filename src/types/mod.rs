//! Types module for WhatsApp protocol types.
//!
//! JIDs and the events emitted by a session socket.

mod events;
mod jid;

pub use events::*;
pub use jid::*;
