use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::{ApiError, AppState};

pub const TOKEN_HEADER: &str = "x-access-token";

/// The `x-access-token` header value, if present and valid UTF-8.
pub fn token_from(headers: &HeaderMap) -> Option<&str> {
    headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

/// Reject requests whose access token is missing or does not match.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from(request.headers()).unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }
    if token != &*state.access_token {
        return Err(ApiError::InvalidToken);
    }
    Ok(next.run(request).await)
}
