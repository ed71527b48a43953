//! Scripted connector and recording webhook transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{Connector, SessionSocket, SocketConnection, SocketError, SocketOptions};
use crate::store::Credentials;
use crate::types::{
    ConnectionUpdate, DisconnectReason, Jid, MessageKey, OutgoingText, SendReceipt, SocketEvent,
};
use crate::webhook::{WebhookError, WebhookEvent, WebhookTransport};

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
pub struct RecordingTransport {
    posts: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.posts().into_iter().map(|(_, body)| body).collect()
    }

    /// Bodies of `connection` events carrying the given status.
    pub fn connection_events(&self, status: &str) -> Vec<Value> {
        self.bodies()
            .into_iter()
            .filter(|b| b["event"] == "connection" && b["status"] == status)
            .collect()
    }

    pub async fn wait_for_posts(&self, count: usize) {
        wait_until(|| self.posts().len() >= count).await;
    }
}

impl WebhookTransport for RecordingTransport {
    fn post_json(&self, url: &str, _event: WebhookEvent, body: &Value) -> Result<(), WebhookError> {
        self.posts.lock().unwrap().push((url.to_string(), body.clone()));
        if self.fail {
            return Err(WebhookError::Status(502, "Bad Gateway".into()));
        }
        Ok(())
    }
}

/// What a fake socket emits as soon as it is opened.
#[derive(Debug, Clone)]
pub enum OnConnect {
    Silent,
    Qr(String),
    Open,
    Close(DisconnectReason),
}

#[derive(Default)]
pub struct FakeConnector {
    script: Mutex<VecDeque<OnConnect>>,
    fallback: Mutex<Option<OnConnect>>,
    sockets: Mutex<Vec<Arc<FakeSocket>>>,
    credentials: Mutex<Vec<Credentials>>,
    fail_connect: AtomicBool,
    fail_logout: AtomicBool,
}

impl FakeConnector {
    pub fn new(script: impl IntoIterator<Item = OnConnect>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Behavior once the script is exhausted.
    pub fn then_always(self, behavior: OnConnect) -> Self {
        *self.fallback.lock().unwrap() = Some(behavior);
        self
    }

    pub fn failing() -> Self {
        let connector = Self::default();
        connector.fail_connect.store(true, Ordering::SeqCst);
        connector
    }

    pub fn fail_logout(self) -> Self {
        self.fail_logout.store(true, Ordering::SeqCst);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    pub fn socket(&self, index: usize) -> Arc<FakeSocket> {
        self.sockets.lock().unwrap()[index].clone()
    }

    pub fn last_credentials(&self) -> Option<Credentials> {
        self.credentials.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        credentials: Credentials,
        _options: &SocketOptions,
    ) -> Result<SocketConnection, SocketError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SocketError::ConnectionFailed("simulated failure".into()));
        }

        let (events, receiver) = broadcast::channel(64);
        let socket = Arc::new(FakeSocket {
            events,
            sent: Mutex::new(Vec::new()),
            logouts: AtomicUsize::new(0),
            fail_logout: self.fail_logout.load(Ordering::SeqCst),
        });
        self.sockets.lock().unwrap().push(socket.clone());
        self.credentials.lock().unwrap().push(credentials);

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(OnConnect::Silent);

        match behavior {
            OnConnect::Silent => {}
            OnConnect::Qr(code) => socket.emit(ConnectionUpdate::qr(code)),
            OnConnect::Open => socket.emit(ConnectionUpdate::open()),
            OnConnect::Close(reason) => socket.emit(ConnectionUpdate::close(reason)),
        }

        Ok(SocketConnection {
            socket,
            events: receiver,
        })
    }
}

pub struct FakeSocket {
    events: broadcast::Sender<SocketEvent>,
    sent: Mutex<Vec<(String, String)>>,
    logouts: AtomicUsize,
    fail_logout: bool,
}

impl FakeSocket {
    pub fn emit(&self, update: ConnectionUpdate) {
        self.emit_event(SocketEvent::ConnectionUpdate(update));
    }

    pub fn emit_event(&self, event: SocketEvent) {
        let _ = self.events.send(event);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSocket for FakeSocket {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, SocketError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));

        Ok(SendReceipt {
            key: MessageKey {
                remote_jid: to.to_string(),
                from_me: true,
                id: "FAKE-ID".into(),
            },
            message: OutgoingText {
                conversation: text.to_string(),
            },
            message_timestamp: 0,
            status: "pending".into(),
        })
    }

    async fn logout(&self) -> Result<(), SocketError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout {
            return Err(SocketError::LogoutFailed("simulated failure".into()));
        }
        self.emit(ConnectionUpdate::close(DisconnectReason::LoggedOut));
        Ok(())
    }
}
