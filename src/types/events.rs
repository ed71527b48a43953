//! Event types delivered by the protocol client.
//!
//! A session socket emits these on its event stream for as long as the
//! handle lives. The session controller is the only consumer.

use serde::{Deserialize, Serialize};

use crate::store::Credentials;

/// Coarse state of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Reason for disconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    TimedOut,
    /// The device was unlinked; credentials are no longer valid.
    LoggedOut,
    BadSession,
    RestartRequired,
    MultideviceMismatch,
    Forbidden,
    UnavailableService,
    Unknown(u16),
}

impl DisconnectReason {
    /// Status code the server attaches to this reason.
    pub fn status_code(&self) -> u16 {
        match self {
            DisconnectReason::ConnectionClosed => 428,
            DisconnectReason::ConnectionLost | DisconnectReason::TimedOut => 408,
            DisconnectReason::ConnectionReplaced => 440,
            DisconnectReason::LoggedOut => 401,
            DisconnectReason::BadSession => 500,
            DisconnectReason::RestartRequired => 515,
            DisconnectReason::MultideviceMismatch => 411,
            DisconnectReason::Forbidden => 403,
            DisconnectReason::UnavailableService => 503,
            DisconnectReason::Unknown(code) => *code,
        }
    }

    /// Whether the session cannot be resumed with the stored credentials.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}

/// Connection state change. Any subset of the fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub connection: Option<ConnectionState>,
    /// Pairing code waiting to be scanned.
    pub qr: Option<String>,
    pub last_disconnect: Option<DisconnectReason>,
}

impl ConnectionUpdate {
    pub fn qr(code: impl Into<String>) -> Self {
        Self {
            qr: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn connecting() -> Self {
        Self {
            connection: Some(ConnectionState::Connecting),
            ..Default::default()
        }
    }

    pub fn open() -> Self {
        Self {
            connection: Some(ConnectionState::Open),
            ..Default::default()
        }
    }

    pub fn close(reason: DisconnectReason) -> Self {
        Self {
            connection: Some(ConnectionState::Close),
            last_disconnect: Some(reason),
            ..Default::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection == Some(ConnectionState::Open)
    }
}

/// Identifies a message within a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    pub from_me: bool,
    pub id: String,
}

/// Content of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        url: String,
        caption: Option<String>,
        mimetype: String,
    },
    Video {
        url: String,
        caption: Option<String>,
        mimetype: String,
    },
    Audio {
        url: String,
        mimetype: String,
        /// Voice note
        ptt: bool,
    },
    Document {
        url: String,
        filename: String,
        mimetype: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
    },
    Reaction {
        target_id: String,
        emoji: String,
    },
    Unknown,
}

/// A message received from the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub key: MessageKey,
    pub push_name: Option<String>,
    pub message_timestamp: i64,
    pub message: MessageContent,
}

/// How a batch of messages reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertKind {
    /// New messages arriving live.
    Notify,
    /// History or own-device messages appended to the store.
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagesUpsert {
    pub kind: UpsertKind,
    pub messages: Vec<InboundMessage>,
}

/// Acknowledgement returned after handing a message to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub key: MessageKey,
    pub message: OutgoingText,
    pub message_timestamp: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingText {
    pub conversation: String,
}

/// All events a session socket can emit
#[derive(Debug, Clone)]
pub enum SocketEvent {
    ConnectionUpdate(ConnectionUpdate),
    /// Credentials changed and must be persisted.
    CredsUpdate(Credentials),
    MessagesUpsert(MessagesUpsert),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_logged_out_is_terminal() {
        assert!(DisconnectReason::LoggedOut.is_logged_out());
        assert_eq!(DisconnectReason::LoggedOut.status_code(), 401);
        for reason in [
            DisconnectReason::ConnectionLost,
            DisconnectReason::ConnectionReplaced,
            DisconnectReason::RestartRequired,
            DisconnectReason::Unknown(499),
        ] {
            assert!(!reason.is_logged_out(), "{reason:?}");
        }
    }

    #[test]
    fn test_inbound_message_serializes_camel_case() {
        let msg = InboundMessage {
            key: MessageKey {
                remote_jid: "123@s.whatsapp.net".into(),
                from_me: false,
                id: "ABC".into(),
            },
            push_name: Some("Ann".into()),
            message_timestamp: 1_700_000_000,
            message: MessageContent::Text { text: "hi".into() },
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["key"]["remoteJid"], "123@s.whatsapp.net");
        assert_eq!(value["key"]["fromMe"], false);
        assert_eq!(value["pushName"], "Ann");
        assert_eq!(value["message"]["type"], "text");
        assert_eq!(value["message"]["text"], "hi");
    }
}
