//! Metrics middleware for automatic API operation tracking
//!
//! Intercepts all requests and records metrics based on HTTP method and
//! path patterns.

use crate::metrics::{ApiOperation, api_metrics};
use axum::{body::Body, extract::Request, http::Method, middleware::Next, response::Response};
use std::time::Instant;

/// Extract the API operation type from HTTP method and path
fn extract_operation(method: &Method, path: &str) -> Option<ApiOperation> {
    let path = path.trim_start_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (m, ["sandboxes"]) if m == Method::GET => Some(ApiOperation::ListSandboxes),
        (m, ["sandboxes", _id]) if m == Method::GET => Some(ApiOperation::GetSandbox),
        (m, ["sandboxes", _id]) if m == Method::PATCH => Some(ApiOperation::UpdateSandboxMetadata),
        _ => None,
    }
}

/// Metrics middleware that records API operation metrics
pub async fn metrics_layer(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip metrics and health endpoints
    if path == "/metrics" || path == "/health" {
        return next.run(request).await;
    }

    let operation = extract_operation(&method, &path);

    let response = next.run(request).await;

    if let Some(op) = operation {
        let status_code = response.status().as_u16();
        let latency_us = start.elapsed().as_micros() as u64;
        api_metrics().record_operation(op, status_code, latency_us);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(
            extract_operation(&Method::GET, "/sandboxes"),
            Some(ApiOperation::ListSandboxes)
        );
        assert_eq!(
            extract_operation(&Method::GET, "/sandboxes/iabc"),
            Some(ApiOperation::GetSandbox)
        );
        assert_eq!(
            extract_operation(&Method::PATCH, "/sandboxes/iabc"),
            Some(ApiOperation::UpdateSandboxMetadata)
        );
        assert_eq!(extract_operation(&Method::GET, "/health"), None);
        assert_eq!(extract_operation(&Method::DELETE, "/sandboxes/iabc"), None);
    }
}
