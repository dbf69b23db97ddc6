//! Authentication middleware for the control-plane API
//!
//! Callers present an API key in the `X-API-Key` header; accepted keys
//! are configured at startup. Health and metrics endpoints skip auth.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Header carrying the caller's API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication state shared across requests
pub struct AuthState {
    /// Accepted API keys
    keys: Vec<String>,
}

impl AuthState {
    /// Create auth state from the configured keys
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Check a presented key against the configured set
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        self.keys.iter().any(|key| constant_time_eq(key, presented))
    }
}

/// Authentication middleware layer
pub async fn auth_layer(
    State(auth_state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path();

    // Skip auth for health checks and metrics
    if path == "/health" || path == "/metrics" {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .ok_or(AuthError::MissingKey)?
        .to_str()
        .map_err(|_| AuthError::InvalidKey)?;

    if !auth_state.verify(presented) {
        warn!(path = %path, "Rejected request with invalid API key");
        return Err(AuthError::InvalidKey);
    }

    Ok(next.run(request).await)
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Authentication error response
#[derive(Debug)]
pub enum AuthError {
    /// No API key header present
    MissingKey,
    /// Key not recognized
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => "missing API key",
            AuthError::InvalidKey => "invalid API key",
        };

        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "code": StatusCode::UNAUTHORIZED.as_u16(),
                "message": message,
            })),
        )
            .into_response()
    }
}
