//! The supervision tick loop
//!
//! Every tick the supervisor asserts its own liveness, classifies each peer
//! from the age of that peer's record, and resurrects the unhealthy ones.
//! Failing to assert our own liveness is the one fatal error: a node that
//! cannot be seen as alive would trigger endless resurrection attempts from
//! its peers, so it must stop supervising. Every other failure resolves
//! toward resurrection, never toward inaction.

use crate::health::PeerHealth;
use crate::launcher::{ProcessLauncher, SpawnRequest};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{Clock, LivenessKey, LivenessStore, NodeIdentity, StoreError, SystemClock};

/// Tunables for the supervision loop.
///
/// `tick_interval` and `staleness_multiplier` must be identical across all
/// members of a group; mismatched values produce asymmetric resurrection
/// decisions.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Period of the check loop
    pub tick_interval: Duration,

    /// K: a peer is stale once its record age exceeds K * tick_interval.
    /// The default of 2 tolerates one missed tick plus I/O jitter.
    pub staleness_multiplier: u32,

    /// Refresh an unhealthy peer's record just before spawning it, to damp
    /// duplicate resurrection attempts from other supervisors. A heuristic,
    /// not a lock; it can make a dead peer look merely slow for one more
    /// threshold window, so it can be turned off.
    pub refresh_before_spawn: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3),
            staleness_multiplier: 2,
            refresh_before_spawn: true,
        }
    }
}

/// One node's supervision state machine
pub struct Supervisor {
    identity: NodeIdentity,
    store: Arc<dyn LivenessStore>,
    launcher: Arc<dyn ProcessLauncher>,
    clock: Arc<dyn Clock>,
    config: SupervisorConfig,
}

impl Supervisor {
    /// Create a supervisor running on the wall clock
    pub fn new(
        identity: NodeIdentity,
        store: Arc<dyn LivenessStore>,
        launcher: Arc<dyn ProcessLauncher>,
        config: SupervisorConfig,
    ) -> Self {
        Self::with_clock(identity, store, launcher, Arc::new(SystemClock), config)
    }

    /// Create a supervisor with an injected clock (for tests)
    pub fn with_clock(
        identity: NodeIdentity,
        store: Arc<dyn LivenessStore>,
        launcher: Arc<dyn ProcessLauncher>,
        clock: Arc<dyn Clock>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            identity,
            store,
            launcher,
            clock,
            config,
        }
    }

    fn key_for(&self, index: usize) -> LivenessKey {
        LivenessKey::derive(self.identity.group_id(), self.identity.name(index))
    }

    fn threshold_ms(&self) -> i64 {
        i64::from(self.config.staleness_multiplier) * self.config.tick_interval.as_millis() as i64
    }

    /// Write the liveness record for the node at `index` with the clock's
    /// current time
    pub async fn record_liveness(&self, index: usize) -> Result<(), StoreError> {
        self.store
            .record(&self.key_for(index), self.clock.now_millis())
            .await
    }

    /// Judge one peer from its record age at time `now_ms`.
    ///
    /// Store failures other than `NotFound` resolve to `Stale`: prefer
    /// restarting a live-but-unreadable peer over never restarting a dead one.
    pub async fn check_peer(&self, index: usize, now_ms: i64) -> PeerHealth {
        match self.store.last_seen(&self.key_for(index)).await {
            Ok(last_seen) => PeerHealth::classify(now_ms - last_seen, self.threshold_ms()),
            Err(StoreError::NotFound(_)) => PeerHealth::Missing,
            Err(e) => {
                warn!(
                    peer = %self.identity.name(index),
                    error = %e,
                    "liveness read failed, treating peer as stale"
                );
                PeerHealth::Stale
            }
        }
    }

    /// One pass of the supervision loop.
    ///
    /// Returns an error only when this node cannot assert its own liveness;
    /// everything else is absorbed and logged.
    pub async fn tick(&self) -> Result<()> {
        self.record_liveness(self.identity.self_index())
            .await
            .context("could not assert own liveness")?;

        let now_ms = self.clock.now_millis();
        for index in self.identity.peer_indices() {
            let health = self.check_peer(index, now_ms).await;
            debug!(peer = %self.identity.name(index), ?health, "peer checked");

            if health.needs_resurrection() {
                self.resurrect(index).await;
            }
        }

        Ok(())
    }

    /// Refresh the peer's record, then ask the launcher for a new process.
    /// Errors from either step are logged and the tick moves on.
    async fn resurrect(&self, index: usize) {
        let peer = self.identity.name(index);
        info!(%peer, "peer unhealthy, attempting resurrection");

        if self.config.refresh_before_spawn {
            if let Err(e) = self.record_liveness(index).await {
                warn!(%peer, error = %e, "could not refresh peer record before spawn");
            }
        }

        let request = SpawnRequest {
            peer_name: peer.to_string(),
            config_path: self.identity.config_path().to_path_buf(),
            peer_index: index,
        };

        match self.launcher.spawn(&request) {
            Ok(()) => info!(%peer, "spawn request accepted"),
            Err(e) => warn!(%peer, error = %e, "spawn failed, retrying next tick"),
        }
    }

    /// Run the loop until `cancel` fires. Ticks never overlap; a tick
    /// completes all peer checks before the next one starts.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            node = %self.identity,
            interval_ms = self.config.tick_interval.as_millis() as u64,
            staleness_multiplier = self.config.staleness_multiplier,
            "supervisor started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(node = %self.identity, "supervisor stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.tick().await?;
                }
            }
        }
    }
}
