//! Connection lifecycle for the single device session.
//!
//! [`SessionController`] owns the session handle and decides when to open,
//! reconnect or tear down. Socket events are pumped by one task per handle;
//! each handle carries a generation number so that events from a replaced
//! handle can be recognised and ignored.

mod outcome;
mod waiter;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};

pub use outcome::{ConnectionStatus, LogoutReason, SessionResult, SessionStatus};
pub use waiter::{QrWaiter, Transition};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, SendError};
use crate::socket::{Connector, SessionSocket, SocketConnection, SocketOptions};
use crate::store::CredentialStore;
use crate::types::{
    ConnectionState, ConnectionUpdate, DisconnectReason, Jid, MessagesUpsert, SendReceipt,
    SocketEvent, UpsertKind,
};
use crate::webhook::{WebhookEvent, WebhookNotifier};

const TRANSITION_BUFFER: usize = 32;

#[derive(Default)]
struct SessionState {
    socket: Option<Arc<dyn SessionSocket>>,
    /// Bumped whenever the handle is replaced or discarded.
    generation: u64,
    is_connected: bool,
    qr: Option<String>,
    reconnect_attempts: u32,
}

impl SessionState {
    /// Drop to disconnected and hand back the discarded handle.
    fn reset(&mut self) -> Option<Arc<dyn SessionSocket>> {
        self.generation += 1;
        self.is_connected = false;
        self.qr = None;
        self.socket.take()
    }
}

/// Follow-up work decided while the state lock was held.
enum Action {
    None,
    Opened,
    Reconnect,
    Terminate,
}

struct Inner {
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    notifier: WebhookNotifier,
    store: CredentialStore,
    state: Mutex<SessionState>,
    transitions: broadcast::Sender<Transition>,
}

/// Cloneable handle to the session service.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        notifier: WebhookNotifier,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let store = CredentialStore::new(config.session_path.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                notifier,
                store,
                state: Mutex::new(SessionState::default()),
                transitions,
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state().generation == generation
    }

    /// Current in-memory status. No I/O.
    pub fn get_connection_status(&self) -> ConnectionStatus {
        let state = self.state();
        ConnectionStatus {
            is_connected: state.is_connected,
            qr: state.qr.clone(),
        }
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state().reconnect_attempts
    }

    pub fn has_active_session(&self) -> bool {
        self.state().socket.is_some()
    }

    /// Number of pairing waits currently subscribed to connection updates.
    pub fn waiter_count(&self) -> usize {
        self.inner.transitions.receiver_count()
    }

    /// Open a new session handle and wait for a pairing code or an open
    /// connection.
    ///
    /// Reconnects count against `max_reconnect_attempts`; the attempt that
    /// would exceed it tears the session down instead. A fresh start resets
    /// the count. Failures come back as an error result, never as a panic.
    pub fn initialize(&self, is_reconnecting: bool) -> BoxFuture<'static, SessionResult> {
        let this = self.clone();
        async move { this.run_initialize(is_reconnecting).await }.boxed()
    }

    async fn run_initialize(&self, is_reconnecting: bool) -> SessionResult {
        let max = self.inner.config.max_reconnect_attempts;

        if is_reconnecting {
            let attempt = {
                let mut state = self.state();
                if state.reconnect_attempts >= max {
                    None
                } else {
                    state.reconnect_attempts += 1;
                    Some(state.reconnect_attempts)
                }
            };

            let Some(attempt) = attempt else {
                warn!("Maximum reconnection attempts ({max}) exceeded");
                return self.handle_logout(LogoutReason::MaxAttemptsExceeded).await;
            };
            info!("Attempting to reconnect... (Attempt {attempt}/{max})");
        } else {
            self.state().reconnect_attempts = 0;
        }

        match self.open_session().await {
            Ok(result) => result,
            Err(err) => {
                error!("Failed to initialize WhatsApp connection: {err}");
                self.inner
                    .notifier
                    .notify(WebhookEvent::Error, json!({ "error": err.to_string() }));
                SessionResult::failure("Failed to initialize WhatsApp connection").with_error(err)
            }
        }
    }

    async fn open_session(&self) -> Result<SessionResult, GatewayError> {
        let config = &self.inner.config;
        let creds = self.inner.store.load_or_create(&config.browser.name).await?;
        let options = SocketOptions {
            browser: config.browser.clone(),
            print_qr_in_terminal: config.print_qr_in_terminal,
        };
        let SocketConnection { socket, events } =
            self.inner.connector.connect(creds, &options).await?;

        let (generation, waiter) = {
            let mut state = self.state();
            state.generation += 1;
            state.socket = Some(socket);
            // Status describes the new handle only, which has not opened yet.
            state.is_connected = false;
            state.qr = None;
            let waiter = QrWaiter::new(self.inner.transitions.subscribe(), state.generation);
            (state.generation, waiter)
        };
        debug!("Opened session handle {generation}");

        tokio::spawn(self.clone().pump(generation, events));

        if let Some(qr) = waiter.wait(config.qr_timeout()).await {
            {
                let mut state = self.state();
                if state.generation == generation && !state.is_connected {
                    state.qr = Some(qr.clone());
                }
            }
            self.inner.notifier.notify(
                WebhookEvent::Connection,
                json!({ "status": "waiting_qr", "qr": qr }),
            );
            return Ok(SessionResult::waiting_qr(qr));
        }

        let connected = self.state().is_connected;
        if connected {
            return Ok(SessionResult::connected());
        }

        Ok(SessionResult::failure(
            "Failed to get QR code or establish connection",
        ))
    }

    /// Deliver one handle's events in order until the stream ends or the
    /// handle is superseded.
    async fn pump(self, generation: u64, mut events: broadcast::Receiver<SocketEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.dispatch(generation, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session {generation} dropped {skipped} socket events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            }

            if !self.is_current(generation) {
                break;
            }
        }
        debug!("Stopped listening to session handle {generation}");
    }

    async fn dispatch(&self, generation: u64, event: SocketEvent) {
        match event {
            SocketEvent::ConnectionUpdate(update) => {
                self.on_connection_update(generation, update).await
            }
            SocketEvent::CredsUpdate(creds) => {
                if !self.is_current(generation) {
                    return;
                }
                if let Err(err) = self.inner.store.save(&creds).await {
                    error!("Failed to persist credentials: {err}");
                }
            }
            SocketEvent::MessagesUpsert(batch) => self.on_messages(batch).await,
        }
    }

    async fn on_connection_update(&self, generation: u64, update: ConnectionUpdate) {
        let action = self.apply_update(generation, &update);

        // Waiters see the update only once the state reflects it.
        let _ = self.inner.transitions.send(Transition { generation, update });

        match action {
            Action::None => {}
            Action::Opened => {
                info!("WhatsApp connection successful!");
                self.inner
                    .notifier
                    .notify(WebhookEvent::Connection, json!({ "status": "connected" }));
            }
            Action::Reconnect => {
                self.initialize(true).await;
            }
            Action::Terminate => {
                info!("Session terminated");
                self.handle_logout(LogoutReason::ConnectionClosed).await;
            }
        }
    }

    fn apply_update(&self, generation: u64, update: &ConnectionUpdate) -> Action {
        let mut state = self.state();
        let current = state.generation == generation;

        match update.connection {
            Some(ConnectionState::Open) => {
                if !current {
                    debug!("Ignoring open from superseded handle {generation}");
                    return Action::None;
                }
                state.is_connected = true;
                state.qr = None;
                state.reconnect_attempts = 0;
                Action::Opened
            }
            Some(ConnectionState::Close) => {
                if !current {
                    if state.is_connected {
                        info!("Connection already active, reconnection cancelled");
                    } else {
                        debug!("Ignoring close from superseded handle {generation}");
                    }
                    return Action::None;
                }

                state.is_connected = false;
                state.qr = None;
                let reason = update
                    .last_disconnect
                    .unwrap_or(DisconnectReason::ConnectionClosed);
                if reason.is_logged_out() {
                    Action::Terminate
                } else {
                    info!(
                        "Connection closed ({reason:?}, status {})",
                        reason.status_code()
                    );
                    Action::Reconnect
                }
            }
            _ => {
                if let Some(qr) = &update.qr {
                    if current && !state.is_connected {
                        state.qr = Some(qr.clone());
                    }
                }
                Action::None
            }
        }
    }

    async fn on_messages(&self, batch: MessagesUpsert) {
        if batch.kind != UpsertKind::Notify {
            return;
        }

        let notifier = &self.inner.notifier;
        join_all(batch.messages.iter().map(|msg| notifier.send_message(msg))).await;
    }

    /// Delete the credentials and reset to disconnected.
    ///
    /// The in-memory state is reset even when the files cannot be removed;
    /// the result then reports the failure.
    pub async fn handle_logout(&self, reason: LogoutReason) -> SessionResult {
        self.state().reset();
        self.finish_cleanup(reason).await
    }

    async fn finish_cleanup(&self, reason: LogoutReason) -> SessionResult {
        match self.inner.store.remove().await {
            Ok(()) => {
                self.inner.notifier.notify(
                    WebhookEvent::Connection,
                    json!({ "status": "logged_out", "reason": reason }),
                );
                info!(
                    "Session files cleaned and session terminated ({})",
                    reason.as_str()
                );
                SessionResult::logged_out(reason)
            }
            Err(err) => {
                error!("Error during session cleanup: {err}");
                SessionResult::failure("Error occurred while terminating session").with_error(err)
            }
        }
    }

    /// Unlink the device and clean up. Without an active handle this does
    /// nothing and reports an error.
    pub async fn logout(&self) -> SessionResult {
        let socket = {
            let mut state = self.state();
            if state.socket.is_some() {
                state.reset()
            } else {
                None
            }
        };

        let Some(socket) = socket else {
            return SessionResult::failure("no active session");
        };

        match socket.logout().await {
            Ok(()) => self.finish_cleanup(LogoutReason::UserLogout).await,
            Err(err) => {
                error!("Error during logout: {err}");
                SessionResult::failure("Error occurred while logging out").with_error(err)
            }
        }
    }

    /// Send a text message over the active connection.
    pub async fn send_text(&self, to: &str, message: &str) -> Result<SendReceipt, SendError> {
        let socket = {
            let state = self.state();
            if !state.is_connected {
                return Err(SendError::NotConnected);
            }
            state.socket.clone().ok_or(SendError::NotConnected)?
        };

        let jid: Jid = to.parse()?;
        let receipt = socket.send_text(&jid, message).await.map_err(|err| {
            error!("Failed to send message: {err}");
            err
        })?;

        info!("Message sent to {jid} ({})", receipt.key.id);
        Ok(receipt)
    }
}
