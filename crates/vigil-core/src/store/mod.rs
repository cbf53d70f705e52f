//! Liveness store implementations
//!
//! The liveness store is the only resource shared between the processes of a
//! group: a key -> epoch-millisecond mapping each node writes for itself and
//! reads for its peers. Writes are unconditional overwrites; same-key races
//! resolve as last-writer-wins, which is acceptable because in steady state
//! only the owning node writes its own key. Records are never deleted, so a
//! missing record always means "never seen".

pub mod file_store;
pub mod memory_store;

pub use file_store::FileLivenessStore;
pub use memory_store::MemoryLivenessStore;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Addressable key for one node's liveness record.
///
/// Derivation is a pure function of (group identifier, node name), so
/// unrelated groups sharing a store never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LivenessKey(String);

impl LivenessKey {
    pub fn derive(group_id: &str, node_name: &str) -> Self {
        Self(format!("LastSeen{group_id}{node_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LivenessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by liveness store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record was ever written for this key. Semantically distinct from a
    /// stale record: the node has never been seen at all.
    #[error("no liveness record for {0}")]
    NotFound(LivenessKey),

    #[error("liveness record for {key} is corrupt: {reason}")]
    Corrupt { key: LivenessKey, reason: String },

    #[error("liveness store i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared key -> timestamp mapping used for mutual liveness detection
#[async_trait]
pub trait LivenessStore: Send + Sync {
    /// Overwrite the record for `key` with `at_ms` (epoch milliseconds).
    /// No compare-and-swap: concurrent writers race as last-writer-wins.
    async fn record(&self, key: &LivenessKey, at_ms: i64) -> Result<(), StoreError>;

    /// Last recorded timestamp for `key`, or `NotFound` if never written.
    async fn last_seen(&self, key: &LivenessKey) -> Result<i64, StoreError>;
}
