use thiserror::Error;

use crate::socket::SocketError;
use crate::store::CredentialError;
use crate::types::ParseJidError;

/// Failure while opening a session.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// Failure on the send path.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("WhatsApp connection is not active")]
    NotConnected,
    #[error("invalid recipient: {0}")]
    InvalidRecipient(#[from] ParseJidError),
    #[error("failed to send message: {0}")]
    Socket(SocketError),
}

impl From<SocketError> for SendError {
    fn from(err: SocketError) -> Self {
        match err {
            SocketError::NotConnected => SendError::NotConnected,
            other => SendError::Socket(other),
        }
    }
}
