//! Vigil Supervisor
//!
//! Mutual peer supervision without a coordinator:
//! - Each node periodically asserts its own liveness in the shared store
//! - Peers whose records go stale (or never appeared) are resurrected by
//!   spawning a fresh process for them
//! - Spawning is fire-and-forget and idempotent by convention: a duplicate
//!   spawn is a nuisance, never a correctness violation

pub mod health;
pub mod launcher;
pub mod supervisor;

pub use health::PeerHealth;
pub use launcher::{NoopLauncher, ProcessLauncher, ScriptLauncher, SpawnError, SpawnRequest};
pub use supervisor::{Supervisor, SupervisorConfig};
