//! In-memory liveness store for testing and development

use crate::store::{LivenessKey, LivenessStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory liveness store (non-persistent, single-process)
#[derive(Clone, Default)]
pub struct MemoryLivenessStore {
    records: Arc<DashMap<LivenessKey, i64>>,
}

impl MemoryLivenessStore {
    /// Create a new in-memory liveness store
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl LivenessStore for MemoryLivenessStore {
    async fn record(&self, key: &LivenessKey, at_ms: i64) -> Result<(), StoreError> {
        self.records.insert(key.clone(), at_ms);
        Ok(())
    }

    async fn last_seen(&self, key: &LivenessKey) -> Result<i64, StoreError> {
        self.records
            .get(key)
            .map(|entry| *entry)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}
