//! Node Connection Pool
//!
//! Manages gRPC connections to the worker nodes that host sandboxes.
//! Channels are established lazily, shared across requests, and keyed by
//! node id so updates for unrelated sandboxes never wait on each other's
//! connections.

use crate::metrics::api_metrics;
use crate::orchestrator::{NodeTransport, TransportError};
use async_trait::async_trait;
use sandgrid_common::{NodeId, NodeRef, SandboxId};
use sandgrid_proto::node::SandboxUpdateRequest;
use sandgrid_proto::node::node_service_client::NodeServiceClient;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::Channel;
use tracing::{error, info};

/// Error type for node pool operations
#[derive(Debug, thiserror::Error)]
pub enum NodePoolError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// A connected worker node
#[derive(Clone)]
pub struct NodeHandle {
    pub node_id: NodeId,
    pub address: String,
    pub client: NodeServiceClient<Channel>,
}

/// Pool of node connections shared by all update calls
pub struct NodePool {
    /// Connected nodes: node_id -> NodeHandle
    nodes: RwLock<HashMap<NodeId, NodeHandle>>,
    /// Address to node_id mapping for deduplication
    address_map: RwLock<HashMap<String, NodeId>>,
    /// Deadline applied to every RPC on an established channel
    rpc_timeout: Duration,
}

impl NodePool {
    /// Create a new empty node pool
    #[must_use]
    pub fn new(rpc_timeout: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            address_map: RwLock::new(HashMap::new()),
            rpc_timeout,
        }
    }

    /// Connect to a worker node and add it to the pool
    pub async fn connect(&self, node_id: NodeId, address: &str) -> Result<(), NodePoolError> {
        // Take the write lock immediately to avoid race conditions
        let mut nodes = self.nodes.write().await;

        // Double-check if already connected (another task may have inserted while we waited)
        if nodes.contains_key(&node_id) {
            return Ok(());
        }

        // Check if the address already has a channel under a different node_id
        let address_map = self.address_map.read().await;
        if let Some(existing_node_id) = address_map.get(address).copied() {
            drop(address_map);

            if let Some(existing) = nodes.get(&existing_node_id).cloned() {
                let aliased = NodeHandle {
                    node_id,
                    address: address.to_string(),
                    client: existing.client,
                };
                nodes.insert(node_id, aliased);
                return Ok(());
            }
        } else {
            drop(address_map);
        }

        // Need to dial - release the lock during the network call
        drop(nodes);

        let channel = tonic::transport::Endpoint::new(address.to_string())
            .map_err(|e| NodePoolError::ConnectionFailed(e.to_string()))?
            .connect()
            .await
            .map_err(|e| NodePoolError::ConnectionFailed(e.to_string()))?;

        let client = NodeServiceClient::new(channel);

        // Re-acquire the lock and check again (another task may have connected)
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node_id) {
            return Ok(());
        }

        nodes.insert(
            node_id,
            NodeHandle {
                node_id,
                address: address.to_string(),
                client,
            },
        );
        drop(nodes);

        self.address_map
            .write()
            .await
            .insert(address.to_string(), node_id);

        api_metrics().node_connected();
        info!("Connected to node {} at {}", node_id, address);
        Ok(())
    }

    /// Get a client for a node, dialing if necessary
    pub async fn get_or_connect(
        &self,
        node_id: NodeId,
        address: &str,
    ) -> Result<NodeServiceClient<Channel>, NodePoolError> {
        // Fast path: existing channel
        if let Some(handle) = self.nodes.read().await.get(&node_id) {
            return Ok(handle.client.clone());
        }

        // Dial (handles races internally)
        self.connect(node_id, address).await?;

        self.nodes
            .read()
            .await
            .get(&node_id)
            .map(|handle| handle.client.clone())
            .ok_or(NodePoolError::NodeNotFound(node_id))
    }

    /// Remove a node from the pool
    pub async fn disconnect(&self, node_id: NodeId) {
        if let Some(handle) = self.nodes.write().await.remove(&node_id) {
            self.address_map.write().await.remove(&handle.address);
            api_metrics().node_disconnected();
            info!("Disconnected from node {}", node_id);
        }
    }

    /// Get all connected node IDs
    pub async fn connected_nodes(&self) -> Vec<NodeId> {
        self.nodes.read().await.keys().copied().collect()
    }

    /// Get the number of connected nodes
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }
}

#[async_trait]
impl NodeTransport for NodePool {
    async fn update_sandbox(
        &self,
        node: &NodeRef,
        sandbox_id: &SandboxId,
        metadata: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        let mut client = self
            .get_or_connect(node.id, &node.address)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let request = SandboxUpdateRequest {
            sandbox_id: sandbox_id.as_str().to_string(),
            metadata: metadata.clone(),
        };

        let update_future = client.update_sandbox(request);
        tokio::time::timeout(self.rpc_timeout, update_future)
            .await
            .map_err(|_| {
                error!("Timeout updating sandbox {} on node {}", sandbox_id, node.address);
                TransportError::CallFailed("update timeout".to_string())
            })?
            .map_err(|e| {
                error!(
                    "Failed to update sandbox {} on node {}: {}",
                    sandbox_id, node.address, e
                );
                TransportError::CallFailed(e.to_string())
            })?;

        Ok(())
    }
}
