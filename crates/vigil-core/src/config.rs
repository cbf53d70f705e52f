//! Group configuration loading
//!
//! A group is described by one JSON file shared by all of its members:
//!
//! ```json
//! {
//!   "group_identifier": "demo",
//!   "names": ["alpha", "beta", "gamma"],
//!   "self_index": 0,
//!   "guid": "…",
//!   "listen_port": 7777
//! }
//! ```
//!
//! The `self_index` on the command line always wins over the value in the
//! file, since every member of the group is started from the same file. The
//! node GUID is generated on first load and written back so it stays stable
//! across restarts.

use crate::node::{NodeIdentity, NodeSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Fixed number of nodes in a supervision group
pub const GROUP_SIZE: usize = 3;

/// Errors raised while loading or completing a group configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("group has {actual} names, expected exactly {GROUP_SIZE}")]
    WrongGroupSize { actual: usize },

    #[error("self index {index} out of range for group of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// On-disk shape of the group configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub group_identifier: String,
    pub names: Vec<String>,
    #[serde(default)]
    pub self_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    pub listen_port: u16,
}

impl NodeConfig {
    /// Load the group file at `path` and produce the identity of member
    /// `self_index`.
    ///
    /// Generates and persists a GUID if the file does not carry one yet.
    pub fn load(path: impl AsRef<Path>, self_index: usize) -> Result<NodeIdentity, ConfigError> {
        let path = path.as_ref();

        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: NodeConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.names.len() != GROUP_SIZE {
            return Err(ConfigError::WrongGroupSize {
                actual: config.names.len(),
            });
        }
        if self_index >= config.names.len() {
            return Err(ConfigError::IndexOutOfRange {
                index: self_index,
                len: config.names.len(),
            });
        }

        config.self_index = self_index;

        let guid = match config.guid.clone() {
            Some(guid) => guid,
            None => {
                let guid = Uuid::new_v4().to_string();
                config.guid = Some(guid.clone());
                config.persist(path)?;
                info!(%guid, path = %path.display(), "generated node guid");
                guid
            }
        };

        NodeIdentity::new(
            config.group_identifier,
            NodeSet::new(config.names),
            self_index,
            guid,
            config.listen_port,
            path,
        )
    }

    /// Write the completed configuration back to `path`
    fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, data).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
