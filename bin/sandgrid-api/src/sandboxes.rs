//! Control-plane sandbox handlers
//!
//! The HTTP boundary: identifier normalization, payload validation, and
//! error-to-status mapping. All merge and commit logic lives in the
//! orchestrator; handlers only delegate and translate outcomes.

use crate::orchestrator::Orchestrator;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use sandgrid_common::{Error, SandboxId};
use sandgrid_registry::InstanceRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<InstanceRegistry>,
    pub orchestrator: Orchestrator,
}

/// Routes served by the control-plane API (auth and metrics layers are
/// applied by the caller)
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sandboxes", get(list_sandboxes))
        .route("/sandboxes/{sandbox_id}", get(get_sandbox))
        .route("/sandboxes/{sandbox_id}", patch(patch_sandbox))
        .with_state(state)
}

/// `PATCH /sandboxes/{sandbox_id}` request body
#[derive(Debug, Deserialize)]
pub struct SandboxUpdateBody {
    /// Metadata patch; `null` or absent means no change requested
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// One sandbox as returned by the read path
#[derive(Debug, Serialize)]
pub struct SandboxSummary {
    pub sandbox_id: String,
    pub node_id: String,
    pub metadata: HashMap<String, String>,
}

/// Error body returned to callers; never carries the underlying cause
#[derive(Debug, Serialize)]
struct ApiErrorBody {
    code: u16,
    message: String,
}

fn error_response(err: &Error) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiErrorBody {
            code: status.as_u16(),
            message: err.client_message(),
        }),
    )
        .into_response()
}

/// Apply a metadata patch to a running sandbox
pub async fn patch_sandbox(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    body: Result<Json<SandboxUpdateBody>, JsonRejection>,
) -> Response {
    let sandbox_id = match SandboxId::parse(&raw_id) {
        Ok(id) => id,
        Err(err) => {
            warn!(raw_id = %raw_id, error = %err, "Rejected malformed sandbox id");
            return error_response(&Error::from(err));
        }
    };

    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(sandbox_id = %sandbox_id, error = %rejection, "Rejected malformed update body");
            return error_response(&Error::bad_request(rejection.body_text()));
        }
    };

    let patch = body.metadata.unwrap_or_default();

    match state
        .orchestrator
        .update_sandbox_metadata(&sandbox_id, &patch)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            // The cause stays in the logs; the caller gets the safe message
            error!(sandbox_id = %sandbox_id, error = %err, "Failed to update sandbox metadata");
            error_response(&err)
        }
    }
}

/// Read one sandbox record from the cache
pub async fn get_sandbox(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let sandbox_id = match SandboxId::parse(&raw_id) {
        Ok(id) => id,
        Err(err) => {
            warn!(raw_id = %raw_id, error = %err, "Rejected malformed sandbox id");
            return error_response(&Error::from(err));
        }
    };

    match state.registry.get(&sandbox_id) {
        Some(record) => Json(SandboxSummary {
            sandbox_id: record.sandbox_id().as_str().to_string(),
            node_id: record.node().id.to_string(),
            metadata: record.metadata(),
        })
        .into_response(),
        None => error_response(&Error::SandboxNotFound(sandbox_id.to_string())),
    }
}

/// List all running sandboxes from the cache
pub async fn list_sandboxes(State(state): State<Arc<AppState>>) -> Json<Vec<SandboxSummary>> {
    let mut sandboxes: Vec<SandboxSummary> = state
        .registry
        .list()
        .iter()
        .map(|record| SandboxSummary {
            sandbox_id: record.sandbox_id().as_str().to_string(),
            node_id: record.node().id.to_string(),
            metadata: record.metadata(),
        })
        .collect();
    sandboxes.sort_by(|a, b| a.sandbox_id.cmp(&b.sandbox_id));
    Json(sandboxes)
}

/// Liveness endpoint
pub async fn health_check() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"status":"healthy"}"#))
        .unwrap()
}
