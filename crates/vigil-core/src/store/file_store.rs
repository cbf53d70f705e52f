//! Filesystem-backed liveness store
//!
//! The production backend. One file per (group, node) key under a shared
//! directory, containing the timestamp as a decimal integer of epoch
//! milliseconds. Plain files keep the store accessible to every process of
//! the group at once; an embedded database holding an exclusive process lock
//! could not serve as the cross-process mailbox this store has to be.

use crate::store::{LivenessKey, LivenessStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Persistent liveness store rooted at a directory shared by the group
pub struct FileLivenessStore {
    dir: PathBuf,
}

impl FileLivenessStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &LivenessKey) -> PathBuf {
        self.dir.join(format!("{}.txt", key.as_str()))
    }
}

#[async_trait]
impl LivenessStore for FileLivenessStore {
    async fn record(&self, key: &LivenessKey, at_ms: i64) -> Result<(), StoreError> {
        // Write to a temp file and rename into place: a concurrent reader
        // sees either the old record or the new one, never a torn write.
        let path = self.path_for(key);
        let tmp = path.with_extension("txt.tmp");
        tokio::fs::write(&tmp, at_ms.to_string()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn last_seen(&self, key: &LivenessKey) -> Result<i64, StoreError> {
        let raw = match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.clone()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        raw.trim()
            .parse::<i64>()
            .map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })
    }
}
