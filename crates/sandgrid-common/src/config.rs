//! Configuration types for Sandgrid
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration for Sandgrid
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control-plane API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Worker node configuration
    #[serde(default)]
    pub node: NodeConfig,
}

/// Control-plane API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address for the HTTP API
    pub listen: SocketAddr,
    /// API keys accepted by the auth middleware
    pub api_keys: Vec<String>,
    /// Timeout for remote node update calls (milliseconds)
    pub node_rpc_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9010".parse().unwrap(),
            api_keys: Vec::new(),
            node_rpc_timeout_ms: 10_000,
        }
    }
}

/// Worker node configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name (human-readable identifier)
    pub name: String,
    /// Address for the internal gRPC service
    pub grpc_listen: SocketAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "sandgrid-node".to_string(),
            grpc_listen: "0.0.0.0:9011".parse().unwrap(),
        }
    }
}
