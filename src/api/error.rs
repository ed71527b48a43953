use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::warn;
use serde_json::json;
use thiserror::Error;

use super::validation::ValidationError;
use crate::error::SendError;

/// Failures surfaced to HTTP callers as `{status:"error", message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid JSON body: {0}")]
    MalformedJson(String),
    #[error("{}", .0.message)]
    Validation(ValidationError),
    #[error(transparent)]
    Send(#[from] SendError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingToken | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::MalformedJson(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Send(SendError::NotConnected | SendError::InvalidRecipient(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Send(SendError::Socket(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {self}");
        }

        let body = match &self {
            ApiError::Validation(err) => json!({
                "status": "error",
                "message": err.message,
                "details": err.details(),
            }),
            _ => json!({ "status": "error", "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
