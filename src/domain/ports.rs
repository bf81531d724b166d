//! Domain Ports - Core trait definitions for the unmanaged racks plugin
//!
//! These traits define the boundaries between the containment logic and
//! external systems: the key/value store holding the containment graph and
//! the southbound Redfish inventory. Adapters implement these traits to
//! provide concrete functionality.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// Write Operations
// =============================================================================

/// A single write buffered by a [`Transaction`] until commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WriteOp {
    Set { key: String, value: String },
    /// Set only if the key is absent at commit time
    SetNx { key: String, value: String },
    Delete { key: String },
    SAdd { key: String, member: String },
    SRem { key: String, member: String },
}

impl WriteOp {
    /// Key this operation writes
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. }
            | WriteOp::SetNx { key, .. }
            | WriteOp::Delete { key }
            | WriteOp::SAdd { key, .. }
            | WriteOp::SRem { key, .. } => key,
        }
    }
}

// =============================================================================
// Store Port
// =============================================================================

/// Key/value store holding chassis bodies and the containment index
///
/// Every method is one round trip and fails with a transient error on
/// transport problems.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a string value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key of any kind, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check whether a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Enumerate keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Members of a set (empty when the key is absent)
    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>>;

    /// Add a member to a set
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set
    async fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// Open an optimistic transaction guarded by `keys`
    ///
    /// Reads through the returned handle observe the snapshot; writes are
    /// buffered and applied atomically by [`Transaction::commit`], which
    /// fails with `TransactionAborted` if any watched key changed since
    /// the watch was taken.
    async fn watch(&self, keys: &[String]) -> Result<Box<dyn Transaction>>;

    /// Check store health
    async fn health_check(&self) -> Result<bool>;
}

/// Handle to an open optimistic transaction
#[async_trait]
pub trait Transaction: Send {
    /// Read a string value
    async fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// Check whether a key exists
    async fn exists(&mut self, key: &str) -> Result<bool>;

    /// Members of a set
    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>>;

    /// Buffer a write
    fn queue(&mut self, op: WriteOp);

    /// Writes buffered so far
    fn pending(&self) -> &[WriteOp];

    /// Apply buffered writes atomically
    ///
    /// Committing with nothing buffered releases the watch and succeeds.
    async fn commit(&mut self) -> Result<()>;

    fn set(&mut self, key: &str, value: &str) {
        self.queue(WriteOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn set_nx(&mut self, key: &str, value: &str) {
        self.queue(WriteOp::SetNx {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn delete(&mut self, key: &str) {
        self.queue(WriteOp::Delete {
            key: key.to_string(),
        });
    }

    fn sadd(&mut self, key: &str, member: &str) {
        self.queue(WriteOp::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        });
    }

    fn srem(&mut self, key: &str, member: &str) {
        self.queue(WriteOp::SRem {
            key: key.to_string(),
            member: member.to_string(),
        });
    }
}

// =============================================================================
// Southbound Port
// =============================================================================

/// Raw response from the upstream Redfish service
#[derive(Debug, Clone, Default)]
pub struct RedfishResponse {
    pub status: u16,
    /// `Location` header, if present
    pub location: Option<String>,
    pub body: String,
}

impl RedfishResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport to the upstream Redfish inventory
///
/// Implementations apply URL translation in both directions; callers work
/// with northbound URIs only.
#[async_trait]
pub trait RedfishTransport: Send + Sync {
    /// GET a resource
    async fn get(&self, uri: &str) -> Result<RedfishResponse>;

    /// POST a JSON body
    async fn post(&self, uri: &str, body: &serde_json::Value) -> Result<RedfishResponse>;
}

// =============================================================================
// Type Aliases for Arc-wrapped traits
// =============================================================================

pub type KvStoreRef = Arc<dyn KvStore>;
pub type RedfishTransportRef = Arc<dyn RedfishTransport>;
