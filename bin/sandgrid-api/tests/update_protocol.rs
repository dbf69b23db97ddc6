//! End-to-end tests of the metadata update protocol against an
//! in-memory node transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use sandgrid_api::orchestrator::{NodeTransport, Orchestrator, TransportError};
use sandgrid_common::{Error, NodeId, NodeRef, SandboxId};
use sandgrid_registry::{InstanceRecord, InstanceRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What the fake node does with each update call
#[derive(Clone, Copy)]
enum Behavior {
    Ack,
    AckAfter(Duration),
    FailUnavailable,
    FailCall,
    Hang,
}

/// Records every remote commit and answers per the configured behavior
struct FakeNode {
    behavior: Behavior,
    calls: Mutex<Vec<(String, HashMap<String, String>)>>,
}

impl FakeNode {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, HashMap<String, String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NodeTransport for FakeNode {
    async fn update_sandbox(
        &self,
        _node: &NodeRef,
        sandbox_id: &SandboxId,
        metadata: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        self.calls
            .lock()
            .push((sandbox_id.as_str().to_string(), metadata.clone()));
        match self.behavior {
            Behavior::Ack => Ok(()),
            Behavior::AckAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::FailUnavailable => Err(TransportError::Unavailable("dial refused".into())),
            Behavior::FailCall => Err(TransportError::CallFailed("rpc failed".into())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn seeded_registry(
    id: &str,
    metadata: HashMap<String, String>,
) -> (Arc<InstanceRegistry>, SandboxId) {
    let registry = Arc::new(InstanceRegistry::new());
    let sandbox_id = SandboxId::new_unchecked(id);
    registry.insert(Arc::new(InstanceRecord::new(
        sandbox_id.clone(),
        NodeRef::new(NodeId::new(), "http://127.0.0.1:9011"),
        metadata,
    )));
    (registry, sandbox_id)
}

#[tokio::test]
async fn test_update_merges_and_commits_locally() {
    let (registry, id) = seeded_registry("iabc", map(&[("a", "1"), ("b", "2")]));
    let node = FakeNode::new(Behavior::Ack);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    orchestrator
        .update_sandbox_metadata(&id, &map(&[("b", "3"), ("c", "4")]))
        .await
        .expect("update should succeed");

    let expected = map(&[("a", "1"), ("b", "3"), ("c", "4")]);
    assert_eq!(registry.get(&id).unwrap().metadata(), expected);

    // The node received exactly the merged map
    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "iabc");
    assert_eq!(calls[0].1, expected);
}

#[tokio::test]
async fn test_empty_patch_is_noop_and_idempotent() {
    let (registry, id) = seeded_registry("iabc", map(&[("a", "1")]));
    let node = FakeNode::new(Behavior::Ack);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    // No-op is not an error, and the node still acknowledges the map
    orchestrator
        .update_sandbox_metadata(&id, &HashMap::new())
        .await
        .expect("first no-op should succeed");
    orchestrator
        .update_sandbox_metadata(&id, &HashMap::new())
        .await
        .expect("second no-op should succeed");

    assert_eq!(registry.get(&id).unwrap().metadata(), map(&[("a", "1")]));
    let calls = node.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, map(&[("a", "1")]));
    assert_eq!(calls[1].1, map(&[("a", "1")]));
}

#[tokio::test]
async fn test_remote_failure_leaves_cache_untouched() {
    let initial = map(&[("a", "1"), ("b", "2")]);
    let (registry, id) = seeded_registry("iabc", initial.clone());
    let node = FakeNode::new(Behavior::FailCall);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    let err = orchestrator
        .update_sandbox_metadata(&id, &map(&[("b", "3")]))
        .await
        .expect_err("update should fail");

    assert!(matches!(err, Error::RemoteUpdateFailed { .. }));
    assert_eq!(registry.get(&id).unwrap().metadata(), initial);
}

#[tokio::test]
async fn test_unreachable_node_maps_to_node_unavailable() {
    let initial = map(&[("a", "1")]);
    let (registry, id) = seeded_registry("iabc", initial.clone());
    let node = FakeNode::new(Behavior::FailUnavailable);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    let err = orchestrator
        .update_sandbox_metadata(&id, &map(&[("b", "2")]))
        .await
        .expect_err("update should fail");

    assert!(matches!(err, Error::NodeUnavailable { .. }));
    assert_eq!(registry.get(&id).unwrap().metadata(), initial);
}

#[tokio::test]
async fn test_unknown_sandbox_makes_no_remote_call() {
    let registry = Arc::new(InstanceRegistry::new());
    let node = FakeNode::new(Behavior::Ack);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    let err = orchestrator
        .update_sandbox_metadata(&SandboxId::new_unchecked("imissing"), &map(&[("a", "1")]))
        .await
        .expect_err("update should fail");

    assert!(matches!(err, Error::SandboxNotFound(_)));
    assert!(node.calls().is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_unicode_metadata_survives_commit() {
    let (registry, id) = seeded_registry("iabc", map(&[("ключ", "старое")]));
    let node = FakeNode::new(Behavior::Ack);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), node.clone());

    let patch = map(&[
        ("ключ", "новое"),
        ("emoji", "🦀 crab"),
        ("path/to.key", "{\"nested\":\"json string\"}"),
    ]);
    orchestrator
        .update_sandbox_metadata(&id, &patch)
        .await
        .expect("update should succeed");

    let expected = map(&[
        ("ключ", "новое"),
        ("emoji", "🦀 crab"),
        ("path/to.key", "{\"nested\":\"json string\"}"),
    ]);
    assert_eq!(registry.get(&id).unwrap().metadata(), expected);
    assert_eq!(node.calls()[0].1, expected);
}

#[tokio::test]
async fn test_concurrent_disjoint_patches_both_survive() {
    let (registry, id) = seeded_registry("iabc", map(&[("base", "0")]));
    let node = FakeNode::new(Behavior::AckAfter(Duration::from_millis(50)));
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), node.clone()));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        async move {
            orchestrator
                .update_sandbox_metadata(&id, &map(&[("x", "1")]))
                .await
        }
    };
    let second = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        async move {
            orchestrator
                .update_sandbox_metadata(&id, &map(&[("y", "2")]))
                .await
        }
    };

    let (a, b) = tokio::join!(first, second);
    a.expect("first update should succeed");
    b.expect("second update should succeed");

    // Neither patch was lost
    let final_map = registry.get(&id).unwrap().metadata();
    assert_eq!(final_map, map(&[("base", "0"), ("x", "1"), ("y", "2")]));

    // Serialization: the later remote commit already carried the earlier
    // caller's patch
    let calls = node.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1.contains_key("x"));
    assert!(calls[1].1.contains_key("y"));
}

#[tokio::test]
async fn test_cancelled_update_commits_nothing_locally() {
    let initial = map(&[("a", "1")]);
    let (registry, id) = seeded_registry("iabc", initial.clone());
    let node = FakeNode::new(Behavior::Hang);
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), node.clone()));

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .update_sandbox_metadata(&id, &map(&[("b", "2")]))
                .await
        })
    };

    // Wait until the update reached the remote commit, then cancel it
    while node.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    task.abort();
    assert!(task.await.is_err());

    // No local commit: the cache still mirrors the last acknowledged map
    assert_eq!(registry.get(&id).unwrap().metadata(), initial);

    // The guard was released by the cancellation; later updates proceed
    let node2 = FakeNode::new(Behavior::Ack);
    let orchestrator2 = Orchestrator::new(Arc::clone(&registry), node2);
    orchestrator2
        .update_sandbox_metadata(&id, &map(&[("c", "3")]))
        .await
        .expect("update after cancellation should succeed");
    assert_eq!(
        registry.get(&id).unwrap().metadata(),
        map(&[("a", "1"), ("c", "3")])
    );
}
