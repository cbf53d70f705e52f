//! Vigil Core
//!
//! This crate provides the shared building blocks of the vigil mesh:
//! - Group configuration loading and per-node identity
//! - The liveness store: a shared key -> timestamp mapping peers use to
//!   prove they are alive
//! - A clock abstraction so staleness logic is testable

pub mod clock;
pub mod config;
pub mod node;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, NodeConfig, GROUP_SIZE};
pub use node::{NodeIdentity, NodeSet};
pub use store::{FileLivenessStore, LivenessKey, LivenessStore, MemoryLivenessStore, StoreError};
