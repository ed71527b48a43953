//! One-shot wait for the first pairing code or an open connection.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::types::ConnectionUpdate;

/// A connection update tagged with the handle generation that produced it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub generation: u64,
    pub update: ConnectionUpdate,
}

/// Owns a subscription to the controller's transitions. The subscription is
/// released when the waiter is consumed, whichever way the wait ends.
pub struct QrWaiter {
    transitions: broadcast::Receiver<Transition>,
    generation: u64,
}

impl QrWaiter {
    pub fn new(transitions: broadcast::Receiver<Transition>, generation: u64) -> Self {
        Self {
            transitions,
            generation,
        }
    }

    /// Resolve with the first pairing code, or `None` when the connection
    /// opens first or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;

        loop {
            let transition =
                match tokio::time::timeout_at(deadline, self.transitions.recv()).await {
                    Err(_) => {
                        debug!("No pairing code or connection within {timeout:?}");
                        return None;
                    }
                    Ok(Err(RecvError::Lagged(skipped))) => {
                        warn!("Pairing waiter skipped {skipped} connection updates");
                        continue;
                    }
                    Ok(Err(RecvError::Closed)) => return None,
                    Ok(Ok(transition)) => transition,
                };

            if transition.generation != self.generation {
                continue;
            }
            if let Some(qr) = transition.update.qr {
                return Some(qr);
            }
            if transition.update.is_open() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DisconnectReason;

    fn transition(generation: u64, update: ConnectionUpdate) -> Transition {
        Transition { generation, update }
    }

    #[tokio::test]
    async fn test_resolves_with_first_code() {
        let (tx, rx) = broadcast::channel(8);
        let waiter = QrWaiter::new(rx, 1);

        tx.send(transition(1, ConnectionUpdate::connecting())).unwrap();
        tx.send(transition(1, ConnectionUpdate::qr("ABC123"))).unwrap();
        tx.send(transition(1, ConnectionUpdate::qr("DEF456"))).unwrap();

        assert_eq!(
            waiter.wait(Duration::from_secs(1)).await.as_deref(),
            Some("ABC123")
        );
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_resolves_empty_on_open() {
        let (tx, rx) = broadcast::channel(8);
        let waiter = QrWaiter::new(rx, 1);

        tx.send(transition(1, ConnectionUpdate::open())).unwrap();

        assert_eq!(waiter.wait(Duration::from_secs(1)).await, None);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_resolves_empty_on_timeout() {
        let (tx, rx) = broadcast::channel::<Transition>(8);
        let waiter = QrWaiter::new(rx, 1);

        assert_eq!(waiter.wait(Duration::from_millis(20)).await, None);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_ignores_other_generations_and_closes() {
        let (tx, rx) = broadcast::channel(8);
        let waiter = QrWaiter::new(rx, 2);

        tx.send(transition(1, ConnectionUpdate::qr("OLD"))).unwrap();
        tx.send(transition(
            2,
            ConnectionUpdate::close(DisconnectReason::ConnectionLost),
        ))
        .unwrap();
        tx.send(transition(2, ConnectionUpdate::qr("NEW"))).unwrap();

        assert_eq!(
            waiter.wait(Duration::from_secs(1)).await.as_deref(),
            Some("NEW")
        );
    }
}
