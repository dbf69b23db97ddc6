//! Sandbox metadata update protocol
//!
//! The one write path of the control plane: locate the owning node,
//! merge the caller's patch into the cached map, commit the merged map
//! on the node, and only then mirror it into the registry. The cached
//! map must never hold a value the node has not acknowledged, so the
//! remote commit always happens first.

use async_trait::async_trait;
use sandgrid_common::{Error, NodeRef, Result, SandboxId};
use sandgrid_registry::InstanceRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Failure modes of the remote commit, as seen through the transport seam
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No route to the node (dial or channel establishment failed)
    #[error("node unreachable: {0}")]
    Unavailable(String),

    /// Node was reachable but the update call errored or timed out
    #[error("update call failed: {0}")]
    CallFailed(String),
}

/// Narrow interface to the worker nodes.
///
/// Implemented by [`NodePool`](crate::node_pool::NodePool) in production
/// and by in-memory doubles in the tests.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Commit the full merged metadata map for a sandbox on its node.
    async fn update_sandbox(
        &self,
        node: &NodeRef,
        sandbox_id: &SandboxId,
        metadata: &HashMap<String, String>,
    ) -> std::result::Result<(), TransportError>;
}

/// Override-only combination of the cached map with a patch.
///
/// Keys unique to `current` are preserved, keys present in both take the
/// patch's value, keys unique to the patch are added. Nothing is ever
/// removed; an empty patch returns `current` unchanged.
#[must_use]
pub fn merge_metadata(
    current: HashMap<String, String>,
    patch: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = current;
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Orchestrates sandbox state changes against the worker fleet
pub struct Orchestrator {
    registry: Arc<InstanceRegistry>,
    transport: Arc<dyn NodeTransport>,
}

impl Orchestrator {
    /// Create an orchestrator over the given registry and node transport
    pub fn new(registry: Arc<InstanceRegistry>, transport: Arc<dyn NodeTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Apply a metadata patch to a running sandbox.
    ///
    /// Sequence: locate the instance record, serialize on its update
    /// guard, merge, commit on the node, then overwrite the cached map.
    /// Any failure before the local commit leaves the cache exactly as
    /// it was. If the caller goes away mid-call the future is dropped
    /// before step 5 and no local commit occurs; re-issuing the request
    /// is safe because the merge is deterministic.
    pub async fn update_sandbox_metadata(
        &self,
        sandbox_id: &SandboxId,
        patch: &HashMap<String, String>,
    ) -> Result<()> {
        // An unknown sandbox must not generate a remote call
        let record = self
            .registry
            .get(sandbox_id)
            .ok_or_else(|| Error::SandboxNotFound(sandbox_id.to_string()))?;

        // Held across read-merge-commit: two concurrent updates to the
        // same sandbox serialize here instead of losing one patch
        let _guard = record.lock_for_update().await;

        let merged = merge_metadata(record.metadata(), patch);

        // Remote commit first; the cache only ever mirrors acknowledged state
        self.transport
            .update_sandbox(record.node(), sandbox_id, &merged)
            .await
            .map_err(|err| match err {
                TransportError::Unavailable(reason) => Error::NodeUnavailable {
                    node: record.node().id.to_string(),
                    reason,
                },
                TransportError::CallFailed(reason) => Error::RemoteUpdateFailed {
                    node: record.node().id.to_string(),
                    reason,
                },
            })?;

        record.set_metadata(merged);

        info!(sandbox_id = %sandbox_id, patch_keys = patch.len(), "Updated sandbox metadata");

        Ok(())
    }
}
