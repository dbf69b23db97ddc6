//! Sandgrid control-plane API
//!
//! Library surface of the API binary, shared with the integration tests.

pub mod auth_middleware;
pub mod metrics;
pub mod metrics_middleware;
pub mod node_pool;
pub mod orchestrator;
pub mod sandboxes;
