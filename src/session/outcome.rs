use serde::Serialize;

/// Status field of every session result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingQr,
    Connected,
    LoggedOut,
    Error,
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserLogout,
    ConnectionClosed,
    MaxAttemptsExceeded,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::UserLogout => "user_logout",
            LogoutReason::ConnectionClosed => "connection_closed",
            LogoutReason::MaxAttemptsExceeded => "max_attempts_exceeded",
        }
    }
}

/// Outcome of a controller operation. Failures are values, never panics or
/// propagated errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    pub success: bool,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LogoutReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionResult {
    fn new(success: bool, status: SessionStatus) -> Self {
        Self {
            success,
            status,
            qr: None,
            message: None,
            reason: None,
            error: None,
        }
    }

    pub fn waiting_qr(qr: impl Into<String>) -> Self {
        Self {
            qr: Some(qr.into()),
            ..Self::new(true, SessionStatus::WaitingQr)
        }
    }

    pub fn connected() -> Self {
        Self {
            message: Some("WhatsApp connection successful".into()),
            ..Self::new(true, SessionStatus::Connected)
        }
    }

    pub fn logged_out(reason: LogoutReason) -> Self {
        Self {
            message: Some("Session successfully terminated".into()),
            reason: Some(reason),
            ..Self::new(true, SessionStatus::LoggedOut)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(false, SessionStatus::Error)
        }
    }

    /// Attach the underlying error text.
    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Snapshot of the connection as seen by HTTP callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub qr: Option<String>,
}
