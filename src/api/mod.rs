//! HTTP surface over the session controller.

mod auth;
mod error;
pub mod validation;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};

pub use auth::TOKEN_HEADER;
pub use error::ApiError;

use crate::session::{ConnectionStatus, SessionController};
use crate::types::SendReceipt;

#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
    pub access_token: Arc<str>,
}

impl AppState {
    pub fn new(controller: SessionController, access_token: impl Into<Arc<str>>) -> Self {
        Self {
            controller,
            access_token: access_token.into(),
        }
    }
}

/// Build the router. Every route requires the access token.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/session", post(echo_token))
        .route("/session/start", post(start_session))
        .route("/session/status", get(session_status))
        .route("/session/logout", post(logout_session))
        .route("/message/send-text", post(send_text))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .with_state(state)
}

async fn echo_token(headers: HeaderMap) -> Json<Value> {
    Json(json!({ "token": auth::token_from(&headers) }))
}

async fn start_session(State(state): State<AppState>) -> Response {
    let result = state.controller.initialize(false).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}

async fn session_status(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(state.controller.get_connection_status())
}

async fn logout_session(State(state): State<AppState>) -> Response {
    let result = state.controller.logout().await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result)).into_response()
}

async fn send_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SendReceipt>, ApiError> {
    let body: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::MalformedJson(err.to_string()))?;
    let request = validation::send_text(&body)?;

    let receipt = state
        .controller
        .send_text(&request.to, &request.message)
        .await?;
    Ok(Json(receipt))
}
