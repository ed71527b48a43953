//! Outgoing webhook notifications.
//!
//! Every lifecycle change and inbound message is POSTed as JSON to the
//! configured endpoint. Delivery is best effort: one attempt per event,
//! failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use log::{debug, error};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::types::InboundMessage;

/// Event name carried in the `event` field of every webhook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Connection,
    Error,
    Message,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::Connection => "connection",
            WebhookEvent::Error => "error",
            WebhookEvent::Message => "message",
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook responded with {0} {1}")]
    Status(u16, String),
    #[error("webhook transport failed: {0}")]
    Transport(String),
}

/// Blocking HTTP transport used to deliver a single webhook body.
pub trait WebhookTransport: Send + Sync {
    fn post_json(&self, url: &str, event: WebhookEvent, body: &Value) -> Result<(), WebhookError>;
}

/// ureq-backed transport.
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            user_agent: format!("whatsmeow-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl WebhookTransport for UreqTransport {
    fn post_json(&self, url: &str, event: WebhookEvent, body: &Value) -> Result<(), WebhookError> {
        let result = self
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .set("User-Agent", &self.user_agent)
            .set("X-Webhook-Event", event.as_str())
            .send_json(body);

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(WebhookError::Status(
                code,
                response.status_text().to_string(),
            )),
            Err(err) => Err(WebhookError::Transport(err.to_string())),
        }
    }
}

/// Fire-and-forget webhook sender.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: Option<Arc<str>>,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookNotifier {
    /// A missing or blank `url` disables webhook traffic.
    pub fn new(url: Option<String>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()).map(Arc::from),
            transport,
        }
    }

    /// Notifier delivering over HTTP with the given request timeout.
    pub fn http(url: Option<String>, timeout: Duration) -> Self {
        Self::new(url, Arc::new(UreqTransport::new(timeout)))
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver in a detached task. Returns immediately.
    pub fn notify(&self, event: WebhookEvent, data: Value) {
        if !self.is_enabled() {
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.deliver(event, data).await;
        });
    }

    /// Deliver and wait for the single attempt to finish. Never fails.
    pub async fn deliver(&self, event: WebhookEvent, data: Value) {
        let Some(url) = self.url.clone() else {
            return;
        };

        let body = payload(event, data);
        let transport = self.transport.clone();
        let outcome =
            tokio::task::spawn_blocking(move || transport.post_json(&url, event, &body)).await;

        match outcome {
            Ok(Ok(())) => debug!("Webhook `{}` delivered", event.as_str()),
            Ok(Err(err)) => error!("Failed to send webhook: {err}"),
            Err(err) => error!("Error during webhook notification: {err}"),
        }
    }

    /// Forward one inbound message as a `message` event.
    pub async fn send_message(&self, message: &InboundMessage) {
        if !self.is_enabled() {
            return;
        }

        match serde_json::to_value(message) {
            Ok(data) => {
                self.deliver(WebhookEvent::Message, json!({ "data": data }))
                    .await
            }
            Err(err) => error!("Could not serialize inbound message {}: {err}", message.key.id),
        }
    }
}

/// Build `{event, timestamp, ...data}`.
fn payload(event: WebhookEvent, data: Value) -> Value {
    let mut body = Map::new();
    body.insert("event".into(), json!(event));
    body.insert(
        "timestamp".into(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    match data {
        Value::Object(extra) => body.extend(extra),
        Value::Null => {}
        other => {
            body.insert("data".into(), other);
        }
    }

    Value::Object(body)
}
