//! Concurrent map of live sandbox records.

use crate::record::InstanceRecord;
use dashmap::DashMap;
use sandgrid_common::SandboxId;
use std::sync::Arc;

/// The control plane's instance cache.
///
/// Keyed by canonical sandbox id. Sharded, so lookups and updates for
/// unrelated sandboxes never contend.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: DashMap<String, Arc<InstanceRecord>>,
}

impl InstanceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for a sandbox
    #[must_use]
    pub fn get(&self, sandbox_id: &SandboxId) -> Option<Arc<InstanceRecord>> {
        self.instances
            .get(sandbox_id.as_str())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Register a record, returning the previous one if the id was taken
    pub fn insert(&self, record: Arc<InstanceRecord>) -> Option<Arc<InstanceRecord>> {
        self.instances
            .insert(record.sandbox_id().as_str().to_string(), record)
    }

    /// Remove the record for a terminated sandbox
    pub fn remove(&self, sandbox_id: &SandboxId) -> Option<Arc<InstanceRecord>> {
        self.instances
            .remove(sandbox_id.as_str())
            .map(|(_, record)| record)
    }

    /// Snapshot of all live records
    #[must_use]
    pub fn list(&self) -> Vec<Arc<InstanceRecord>> {
        self.instances
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of live sandboxes
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandgrid_common::{NodeId, NodeRef};
    use std::collections::HashMap;

    fn record(id: &str) -> Arc<InstanceRecord> {
        Arc::new(InstanceRecord::new(
            SandboxId::new_unchecked(id),
            NodeRef::new(NodeId::new(), "http://127.0.0.1:9011"),
            HashMap::new(),
        ))
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = InstanceRegistry::new();
        assert!(registry.is_empty());

        registry.insert(record("iabc"));
        assert_eq!(registry.len(), 1);

        let id = SandboxId::new_unchecked("iabc");
        let found = registry.get(&id).expect("record should exist");
        assert_eq!(found.sandbox_id().as_str(), "iabc");

        registry.remove(&id);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_get_unknown_is_none() {
        let registry = InstanceRegistry::new();
        assert!(
            registry
                .get(&SandboxId::new_unchecked("missing"))
                .is_none()
        );
    }

    #[test]
    fn test_insert_replaces() {
        let registry = InstanceRegistry::new();
        registry.insert(record("iabc"));
        let previous = registry.insert(record("iabc"));
        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list() {
        let registry = InstanceRegistry::new();
        registry.insert(record("iaaa"));
        registry.insert(record("ibbb"));
        let mut ids: Vec<String> = registry
            .list()
            .iter()
            .map(|r| r.sandbox_id().as_str().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["iaaa", "ibbb"]);
    }
}
