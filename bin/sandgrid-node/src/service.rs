//! Node gRPC service implementation
//!
//! The node's copy of sandbox state is authoritative: the control plane
//! only mirrors what this service has acknowledged. `UpdateSandbox`
//! stores the full merged map sent by the control plane; the merge
//! itself happens there, not here.

use parking_lot::RwLock;
use sandgrid_common::{NodeId, SandboxId};
use sandgrid_proto::node::node_service_server::NodeService;
use sandgrid_proto::node::{
    HealthCheckRequest, HealthCheckResponse, SandboxUpdateRequest, SandboxUpdateResponse,
};
use std::collections::HashMap;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

/// State of one sandbox hosted on this node
#[derive(Clone, Debug, Default)]
pub struct SandboxState {
    /// Last acknowledged metadata map
    pub metadata: HashMap<String, String>,
}

/// Worker node service state
pub struct SandboxNode {
    node_id: NodeId,
    /// Hosted sandboxes: sandbox_id -> state
    sandboxes: RwLock<HashMap<String, SandboxState>>,
}

impl SandboxNode {
    /// Create an empty node service
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            sandboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a running sandbox on this node.
    ///
    /// Provisioning lives outside this service; this entry point exists
    /// for startup seeding and tests.
    pub fn register_sandbox(&self, sandbox_id: &SandboxId) {
        self.sandboxes
            .write()
            .entry(sandbox_id.as_str().to_string())
            .or_default();
    }

    /// Remove a terminated sandbox
    pub fn deregister_sandbox(&self, sandbox_id: &SandboxId) {
        self.sandboxes.write().remove(sandbox_id.as_str());
    }

    /// Snapshot of one sandbox's metadata, if hosted here
    #[must_use]
    pub fn sandbox_metadata(&self, sandbox_id: &SandboxId) -> Option<HashMap<String, String>> {
        self.sandboxes
            .read()
            .get(sandbox_id.as_str())
            .map(|state| state.metadata.clone())
    }

    /// Number of sandboxes currently hosted
    #[must_use]
    pub fn sandbox_count(&self) -> usize {
        self.sandboxes.read().len()
    }
}

#[tonic::async_trait]
impl NodeService for SandboxNode {
    async fn update_sandbox(
        &self,
        request: Request<SandboxUpdateRequest>,
    ) -> Result<Response<SandboxUpdateResponse>, Status> {
        let req = request.into_inner();

        let mut sandboxes = self.sandboxes.write();
        let Some(state) = sandboxes.get_mut(&req.sandbox_id) else {
            warn!(sandbox_id = %req.sandbox_id, "Update for sandbox not hosted here");
            return Err(Status::not_found(format!(
                "sandbox not hosted on this node: {}",
                req.sandbox_id
            )));
        };

        // Full replacement: the control plane sends the merged map
        state.metadata = req.metadata;

        debug!(
            sandbox_id = %req.sandbox_id,
            keys = state.metadata.len(),
            "Stored sandbox metadata"
        );

        Ok(Response::new(SandboxUpdateResponse {}))
    }

    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(HealthCheckResponse {
            node_id: self.node_id.to_string(),
            sandbox_count: u32::try_from(self.sandbox_count()).unwrap_or(u32::MAX),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_update_unknown_sandbox_is_not_found() {
        let node = SandboxNode::new(NodeId::new());
        let result = node
            .update_sandbox(Request::new(SandboxUpdateRequest {
                sandbox_id: "imissing".to_string(),
                metadata: map(&[("a", "1")]),
            }))
            .await;

        let status = result.expect_err("update should fail");
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_update_replaces_stored_map() {
        let node = SandboxNode::new(NodeId::new());
        let id = SandboxId::new_unchecked("iabc");
        node.register_sandbox(&id);

        node.update_sandbox(Request::new(SandboxUpdateRequest {
            sandbox_id: "iabc".to_string(),
            metadata: map(&[("a", "1"), ("b", "2")]),
        }))
        .await
        .expect("first update should succeed");

        // The node stores whatever merged map the control plane sends;
        // it does not merge again
        node.update_sandbox(Request::new(SandboxUpdateRequest {
            sandbox_id: "iabc".to_string(),
            metadata: map(&[("b", "3")]),
        }))
        .await
        .expect("second update should succeed");

        assert_eq!(node.sandbox_metadata(&id), Some(map(&[("b", "3")])));
    }

    #[tokio::test]
    async fn test_health_check_reports_count() {
        let node = SandboxNode::new(NodeId::new());
        node.register_sandbox(&SandboxId::new_unchecked("iaaa"));
        node.register_sandbox(&SandboxId::new_unchecked("ibbb"));

        let response = node
            .health_check(Request::new(HealthCheckRequest {}))
            .await
            .expect("health check should succeed")
            .into_inner();

        assert_eq!(response.sandbox_count, 2);
    }

    #[tokio::test]
    async fn test_deregister_removes_sandbox() {
        let node = SandboxNode::new(NodeId::new());
        let id = SandboxId::new_unchecked("iabc");
        node.register_sandbox(&id);
        node.deregister_sandbox(&id);
        assert!(node.sandbox_metadata(&id).is_none());
        assert_eq!(node.sandbox_count(), 0);
    }
}
