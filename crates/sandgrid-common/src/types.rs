//! Core type definitions for Sandgrid
//!
//! This module defines the fundamental types used throughout the system
//! including sandbox and node identifiers.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length of a canonical sandbox identifier
const SANDBOX_ID_MAX_LEN: usize = 32;

/// Canonical identifier for a running sandbox
///
/// Clients address sandboxes with a longer external form
/// (`<sandbox-id>-<routing-suffix>`); the canonical short form is the
/// segment before the first `-`, restricted to lowercase ASCII
/// alphanumerics.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct SandboxId(String);

impl SandboxId {
    /// Parse an externally-supplied identifier into canonical form.
    ///
    /// Anything after the first `-` is a client routing suffix and is
    /// stripped before validation.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, SandboxIdError> {
        let short = raw
            .as_ref()
            .split_once('-')
            .map_or(raw.as_ref(), |(head, _)| head);
        Self::validate(short)?;
        Ok(Self(short.to_string()))
    }

    /// Create without validation (internal use only)
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the canonical identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), SandboxIdError> {
        if id.is_empty() {
            return Err(SandboxIdError::Empty);
        }
        if id.len() > SANDBOX_ID_MAX_LEN {
            return Err(SandboxIdError::TooLong);
        }
        for c in id.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() {
                return Err(SandboxIdError::InvalidChar(c));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SandboxId({:?})", self.0)
    }
}

/// Errors that can occur when parsing a sandbox identifier
#[derive(Debug, Clone, thiserror::Error)]
pub enum SandboxIdError {
    #[error("sandbox id cannot be empty")]
    Empty,
    #[error("sandbox id cannot exceed {SANDBOX_ID_MAX_LEN} characters")]
    TooLong,
    #[error("sandbox id contains invalid character: {0}")]
    InvalidChar(char),
}

/// Unique identifier for a worker node
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a new random node ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and gRPC address of the node hosting a sandbox
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    /// Node identifier
    pub id: NodeId,
    /// gRPC endpoint of the node service (e.g. `http://10.0.0.7:9011`)
    pub address: String,
}

impl NodeRef {
    /// Create a new node reference
    #[must_use]
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}
