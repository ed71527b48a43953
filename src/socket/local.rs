//! In-process device backend.
//!
//! Mimics the lifecycle of a linked device: pairing codes rotate until the
//! device is paired (or the codes run out), a paired device opens straight
//! away, and logout unlinks it. Useful for running the gateway without a
//! network client and as the reference behavior for other connectors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use super::qr::{self, CODES_PER_ATTEMPT};
use super::{Connector, SessionSocket, SocketConnection, SocketError, SocketOptions};
use crate::store::Credentials;
use crate::types::{
    ConnectionUpdate, DisconnectReason, InboundMessage, Jid, MessageContent, MessageKey,
    MessagesUpsert, OutgoingText, SendReceipt, SocketEvent, UpsertKind,
};

const EVENT_BUFFER: usize = 64;

/// Connector producing [`LocalDevice`] sockets.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    pair_after: Option<Duration>,
    echo: bool,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair automatically once the delay has passed, as if a code was scanned.
    pub fn with_auto_pair(mut self, delay: Duration) -> Self {
        self.pair_after = Some(delay);
        self
    }

    /// Reflect every sent text back as an inbound message from the recipient.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(
        &self,
        credentials: Credentials,
        options: &SocketOptions,
    ) -> Result<SocketConnection, SocketError> {
        let (events, receiver) = broadcast::channel(EVENT_BUFFER);
        let (shutdown, _) = watch::channel(false);

        let device = Arc::new(LocalDevice {
            events,
            open: AtomicBool::new(false),
            shutdown,
            echo: self.echo,
        });

        tokio::spawn(
            device
                .clone()
                .run(credentials, options.clone(), self.pair_after),
        );

        Ok(SocketConnection {
            socket: device,
            events: receiver,
        })
    }
}

/// A simulated linked device.
pub struct LocalDevice {
    events: broadcast::Sender<SocketEvent>,
    open: AtomicBool,
    shutdown: watch::Sender<bool>,
    echo: bool,
}

impl LocalDevice {
    fn emit(&self, event: SocketEvent) {
        // Nobody listening means the handle was already discarded.
        let _ = self.events.send(event);
    }

    fn emit_update(&self, update: ConnectionUpdate) {
        self.emit(SocketEvent::ConnectionUpdate(update));
    }

    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn mark_open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.emit_update(ConnectionUpdate::open());
    }

    fn close(&self, reason: DisconnectReason) {
        self.open.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
        self.emit_update(ConnectionUpdate::close(reason));
    }

    async fn run(
        self: Arc<Self>,
        mut creds: Credentials,
        options: SocketOptions,
        pair_after: Option<Duration>,
    ) {
        let mut shutdown = self.shutdown.subscribe();
        self.emit_update(ConnectionUpdate::connecting());

        if creds.is_registered() {
            self.mark_open();
            return;
        }

        let pair_deadline = pair_after.map(|delay| Instant::now() + delay);
        let codes = qr::pairing_codes(&creds, CODES_PER_ATTEMPT);

        for (index, code) in codes.into_iter().enumerate() {
            if self.events.receiver_count() == 0 {
                info!("Session handle dropped, stopping pairing");
                return;
            }
            if options.print_qr_in_terminal {
                match qr::render_terminal(&code) {
                    Ok(image) => println!("{image}"),
                    Err(err) => warn!("Could not render pairing code: {err}"),
                }
            }
            self.emit_update(ConnectionUpdate::qr(code));

            let expires = Instant::now() + qr::code_timeout(index);
            let wake = match pair_deadline {
                Some(deadline) if deadline < expires => deadline,
                _ => expires,
            };

            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                _ = shutdown.changed() => return,
            }

            if pair_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let number: u64 = rand::thread_rng().gen_range(10_000_000_000..99_999_999_999);
                creds.register(Jid::user(number.to_string()).to_string());
                info!("Device paired as {}", creds.registered_jid.as_deref().unwrap_or(""));
                self.emit(SocketEvent::CredsUpdate(creds.clone()));
                self.mark_open();
                return;
            }
        }

        info!("Pairing codes exhausted without a scan");
        self.close(DisconnectReason::TimedOut);
    }
}

#[async_trait]
impl SessionSocket for LocalDevice {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, SocketError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SocketError::NotConnected);
        }

        let now = Utc::now().timestamp();
        let receipt = SendReceipt {
            key: MessageKey {
                remote_jid: to.to_string(),
                from_me: true,
                id: format!("{:X}", rand::random::<u64>()),
            },
            message: OutgoingText {
                conversation: text.to_string(),
            },
            message_timestamp: now,
            status: "pending".into(),
        };

        if self.echo {
            self.emit(SocketEvent::MessagesUpsert(MessagesUpsert {
                kind: UpsertKind::Notify,
                messages: vec![InboundMessage {
                    key: MessageKey {
                        remote_jid: to.to_string(),
                        from_me: false,
                        id: uuid::Uuid::new_v4().simple().to_string().to_uppercase(),
                    },
                    push_name: None,
                    message_timestamp: now,
                    message: MessageContent::Text {
                        text: text.to_string(),
                    },
                }],
            }));
        }

        Ok(receipt)
    }

    async fn logout(&self) -> Result<(), SocketError> {
        if self.is_closed() {
            return Err(SocketError::ConnectionClosed);
        }
        self.close(DisconnectReason::LoggedOut);
        Ok(())
    }
}
