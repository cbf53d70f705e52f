//! Node identity within a supervision group
//!
//! Every process in a group holds the same ordered set of node names and
//! exactly one index into it. Identity is fixed at startup and never mutated.

use crate::config::ConfigError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Ordered, immutable set of node display names for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet(Vec<String>);

impl NodeSet {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display name of the node at `index`
    pub fn name(&self, index: usize) -> &str {
        &self.0[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Immutable identity of one running node process
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    group_id: String,
    nodes: NodeSet,
    self_index: usize,
    guid: String,
    listen_port: u16,
    config_path: PathBuf,
}

impl NodeIdentity {
    /// Build an identity, rejecting a self index outside the node set
    pub fn new(
        group_id: impl Into<String>,
        nodes: NodeSet,
        self_index: usize,
        guid: impl Into<String>,
        listen_port: u16,
        config_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if self_index >= nodes.len() {
            return Err(ConfigError::IndexOutOfRange {
                index: self_index,
                len: nodes.len(),
            });
        }

        Ok(Self {
            group_id: group_id.into(),
            nodes,
            self_index,
            guid: guid.into(),
            listen_port,
            config_path: config_path.into(),
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn self_index(&self) -> usize {
        self.self_index
    }

    /// Display name of the node at `index`
    pub fn name(&self, index: usize) -> &str {
        self.nodes.name(index)
    }

    /// This process's own display name
    pub fn self_name(&self) -> &str {
        self.nodes.name(self.self_index)
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Path of the shared group configuration file, passed on to spawned peers
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Indices of every node in the group except this one
    pub fn peer_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(move |i| *i != self.self_index)
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.self_name())
    }
}
