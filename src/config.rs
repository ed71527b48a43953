use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser triple advertised to the network when linking the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserDescription {
    pub name: String,
    pub platform: String,
    pub version: String,
}

impl Default for BrowserDescription {
    fn default() -> Self {
        Self {
            name: "Whatsmeow REST API".into(),
            platform: "Chrome".into(),
            version: "1.0.0".into(),
        }
    }
}

/// Base configuration used by the session controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Directory holding the device credentials.
    pub session_path: PathBuf,
    /// Reconnects allowed without an intervening successful open.
    pub max_reconnect_attempts: u32,
    /// How long a session start waits for a pairing code or an open connection.
    pub qr_timeout_ms: u64,
    /// Render pairing codes in the terminal as they arrive.
    pub print_qr_in_terminal: bool,
    pub browser: BrowserDescription,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_path: "./sessions".into(),
            max_reconnect_attempts: 5,
            qr_timeout_ms: 60_000,
            print_qr_in_terminal: true,
            browser: BrowserDescription::default(),
        }
    }
}

impl GatewayConfig {
    pub fn qr_timeout(&self) -> Duration {
        Duration::from_millis(self.qr_timeout_ms)
    }

    /// Override the credential directory.
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Override how long a session start waits for a pairing code.
    pub fn with_qr_timeout(mut self, timeout: Duration) -> Self {
        self.qr_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_print_qr_in_terminal(mut self, enabled: bool) -> Self {
        self.print_qr_in_terminal = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.qr_timeout(), Duration::from_secs(60));
    }
}
