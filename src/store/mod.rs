//! Storage module for session credential persistence.
//!
//! The credential directory is the only durable state the gateway owns. It
//! is created on the first session start and deleted on terminal logout.

mod credentials;

pub use credentials::*;
