//! One cache entry per live sandbox.

use parking_lot::RwLock;
use sandgrid_common::{NodeRef, SandboxId};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

/// Control-plane record of one running sandbox.
///
/// `metadata` is a mirror: it must only ever hold a map the owning node
/// has acknowledged. Writers serialize through [`lock_for_update`], held
/// across the whole locate-merge-commit sequence, so two concurrent
/// updates to the same sandbox cannot lose each other's patch.
///
/// [`lock_for_update`]: InstanceRecord::lock_for_update
pub struct InstanceRecord {
    sandbox_id: SandboxId,
    node: NodeRef,
    metadata: RwLock<HashMap<String, String>>,
    update_guard: Mutex<()>,
}

impl InstanceRecord {
    /// Create a record for a freshly provisioned sandbox
    #[must_use]
    pub fn new(sandbox_id: SandboxId, node: NodeRef, metadata: HashMap<String, String>) -> Self {
        Self {
            sandbox_id,
            node,
            metadata: RwLock::new(metadata),
            update_guard: Mutex::new(()),
        }
    }

    /// Canonical identifier of the sandbox
    #[must_use]
    pub fn sandbox_id(&self) -> &SandboxId {
        &self.sandbox_id
    }

    /// Node currently hosting the sandbox
    #[must_use]
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Snapshot of the cached metadata map
    #[must_use]
    pub fn metadata(&self) -> HashMap<String, String> {
        self.metadata.read().clone()
    }

    /// Overwrite the cached metadata map.
    ///
    /// Callers must hold the update guard and must have received the
    /// node's acknowledgement for exactly this value.
    pub fn set_metadata(&self, metadata: HashMap<String, String>) {
        *self.metadata.write() = metadata;
    }

    /// Acquire the per-sandbox update guard
    pub async fn lock_for_update(&self) -> MutexGuard<'_, ()> {
        self.update_guard.lock().await
    }
}

impl std::fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("sandbox_id", &self.sandbox_id)
            .field("node", &self.node)
            .field("metadata", &*self.metadata.read())
            .finish_non_exhaustive()
    }
}
