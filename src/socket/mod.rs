//! Seam to the protocol client.
//!
//! The gateway never speaks the WhatsApp wire protocol itself. A [`Connector`]
//! opens a [`SessionSocket`] from stored credentials and hands back the
//! socket's event stream; everything else is delegated.

mod local;
pub mod qr;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::BrowserDescription;
use crate::store::Credentials;
use crate::types::{Jid, SendReceipt, SocketEvent};

pub use local::LocalConnector;

/// Socket errors.
#[derive(Debug, Clone, Error)]
pub enum SocketError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("not connected")]
    NotConnected,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("logout failed: {0}")]
    LogoutFailed(String),
}

/// Options handed to the protocol client when opening a socket.
#[derive(Debug, Clone, Default)]
pub struct SocketOptions {
    pub browser: BrowserDescription,
    pub print_qr_in_terminal: bool,
}

/// A freshly opened socket together with its event subscription.
///
/// The receiver exists before the client emits anything, so the first
/// pairing code cannot be missed.
pub struct SocketConnection {
    pub socket: Arc<dyn SessionSocket>,
    pub events: broadcast::Receiver<SocketEvent>,
}

/// Opens sockets against the messaging network.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: Credentials,
        options: &SocketOptions,
    ) -> Result<SocketConnection, SocketError>;
}

/// A live device session.
#[async_trait]
pub trait SessionSocket: Send + Sync {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, SocketError>;

    /// Unlink the device from the account and close the connection.
    async fn logout(&self) -> Result<(), SocketError>;
}
