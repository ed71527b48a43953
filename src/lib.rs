//! whatsmeow-gateway: REST gateway for a single WhatsApp device session.
//!
//! ## Modules
//!
//! - `types` - JIDs, connection updates and message events
//! - `socket` - Protocol client seam and the bundled local backend
//! - `store` - Credential persistence
//! - `session` - Connection lifecycle controller
//! - `webhook` - Outgoing event notifications
//! - `api` - HTTP routes

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod socket;
pub mod store;
pub mod types;
pub mod webhook;

pub use api::{router, AppState};
pub use config::{BrowserDescription, GatewayConfig};
pub use error::{GatewayError, SendError};
pub use session::{ConnectionStatus, LogoutReason, SessionController, SessionResult, SessionStatus};
pub use socket::{Connector, LocalConnector, SessionSocket, SocketError};
pub use store::{CredentialStore, Credentials};
pub use types::{Jid, ParseJidError};
pub use webhook::{WebhookEvent, WebhookNotifier};
