//! Tests for the supervision tick loop

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vigil_core::{
    LivenessKey, LivenessStore, ManualClock, MemoryLivenessStore, NodeIdentity, NodeSet,
    StoreError,
};
use vigil_supervisor::{
    PeerHealth, ProcessLauncher, SpawnError, SpawnRequest, Supervisor, SupervisorConfig,
};

use async_trait::async_trait;

fn identity(self_index: usize) -> NodeIdentity {
    NodeIdentity::new(
        "demo",
        NodeSet::new(vec!["alpha".into(), "beta".into(), "gamma".into()]),
        self_index,
        "test-guid",
        7777,
        "group.json",
    )
    .unwrap()
}

fn key(name: &str) -> LivenessKey {
    LivenessKey::derive("demo", name)
}

fn config(tick_ms: u64) -> SupervisorConfig {
    SupervisorConfig {
        tick_interval: Duration::from_millis(tick_ms),
        staleness_multiplier: 2,
        refresh_before_spawn: true,
    }
}

/// Launcher double that remembers every request it accepted
#[derive(Clone, Default)]
struct RecordingLauncher {
    spawned: Arc<Mutex<Vec<SpawnRequest>>>,
}

impl RecordingLauncher {
    fn requests(&self) -> Vec<SpawnRequest> {
        self.spawned.lock().unwrap().clone()
    }

    fn count_for(&self, peer: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.peer_name == peer)
            .count()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError> {
        self.spawned.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Launcher double that fails every request as an unsupported platform
#[derive(Clone, Default)]
struct FailingLauncher {
    attempts: Arc<Mutex<Vec<String>>>,
}

impl ProcessLauncher for FailingLauncher {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError> {
        self.attempts.lock().unwrap().push(request.peer_name.clone());
        Err(SpawnError::UnsupportedPlatform("plan9".into()))
    }
}

/// Launcher double that snapshots the peer's store record at spawn time,
/// to observe the refresh-before-spawn ordering
#[derive(Clone)]
struct InspectingLauncher {
    store: MemoryLivenessStore,
    records_at_spawn: Arc<Mutex<Vec<(String, Result<i64, String>)>>>,
}

impl InspectingLauncher {
    fn new(store: MemoryLivenessStore) -> Self {
        Self {
            store,
            records_at_spawn: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ProcessLauncher for InspectingLauncher {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError> {
        // The memory store resolves without suspending, so blocking here is
        // safe inside a test.
        let seen = futures::executor::block_on(self.store.last_seen(&key(&request.peer_name)))
            .map_err(|e| e.to_string());
        self.records_at_spawn
            .lock()
            .unwrap()
            .push((request.peer_name.clone(), seen));
        Ok(())
    }
}

/// Store double that fails selected operations
struct FlakyStore {
    inner: MemoryLivenessStore,
    fail_writes_to: Option<LivenessKey>,
    fail_reads_from: Option<LivenessKey>,
}

#[async_trait]
impl LivenessStore for FlakyStore {
    async fn record(&self, k: &LivenessKey, at_ms: i64) -> Result<(), StoreError> {
        if self.fail_writes_to.as_ref() == Some(k) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.record(k, at_ms).await
    }

    async fn last_seen(&self, k: &LivenessKey) -> Result<i64, StoreError> {
        if self.fail_reads_from.as_ref() == Some(k) {
            return Err(StoreError::Io(std::io::Error::other("read failure")));
        }
        self.inner.last_seen(k).await
    }
}

#[tokio::test]
async fn tick_records_own_liveness_with_injected_clock() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(50_000);
    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(RecordingLauncher::default()),
        Arc::new(clock),
        config(1_000),
    );

    supervisor.tick().await.unwrap();

    assert_eq!(store.last_seen(&key("alpha")).await.unwrap(), 50_000);
}

#[tokio::test]
async fn record_then_read_returns_injected_now() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(123_456);
    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(RecordingLauncher::default()),
        Arc::new(clock),
        config(1_000),
    );

    supervisor.record_liveness(2).await.unwrap();

    assert_eq!(store.last_seen(&key("gamma")).await.unwrap(), 123_456);
}

#[tokio::test]
async fn peer_at_exact_threshold_is_alive() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(100_000);
    let launcher = RecordingLauncher::default();

    // K = 2, tick = 1s: threshold is 2000ms, exclusive.
    store.record(&key("beta"), 98_000).await.unwrap();
    store.record(&key("gamma"), 98_000).await.unwrap();

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    assert_eq!(supervisor.check_peer(1, 100_000).await, PeerHealth::Alive);

    supervisor.tick().await.unwrap();
    assert!(launcher.requests().is_empty());
}

#[tokio::test]
async fn peer_one_millisecond_past_threshold_is_stale() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(100_001);
    let launcher = RecordingLauncher::default();

    store.record(&key("beta"), 98_000).await.unwrap();
    store.record(&key("gamma"), 100_000).await.unwrap();

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    assert_eq!(supervisor.check_peer(1, 100_001).await, PeerHealth::Stale);

    supervisor.tick().await.unwrap();
    assert_eq!(launcher.count_for("beta"), 1);
    assert_eq!(launcher.count_for("gamma"), 0);
}

#[tokio::test]
async fn peer_never_seen_is_missing_and_resurrected() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(10_000);
    let launcher = RecordingLauncher::default();

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    assert_eq!(supervisor.check_peer(1, 10_000).await, PeerHealth::Missing);

    supervisor.tick().await.unwrap();
    assert_eq!(launcher.count_for("beta"), 1);
    assert_eq!(launcher.count_for("gamma"), 1);
}

#[tokio::test]
async fn spawn_requests_carry_rejoin_arguments() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(10_000);
    let launcher = RecordingLauncher::default();

    let supervisor = Supervisor::with_clock(
        identity(1),
        Arc::new(store),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    supervisor.tick().await.unwrap();

    let requests = launcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.contains(&SpawnRequest {
        peer_name: "alpha".into(),
        config_path: PathBuf::from("group.json"),
        peer_index: 0,
    }));
    assert!(requests.contains(&SpawnRequest {
        peer_name: "gamma".into(),
        config_path: PathBuf::from("group.json"),
        peer_index: 2,
    }));
}

#[tokio::test]
async fn record_is_refreshed_strictly_before_spawn() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(77_000);
    let launcher = InspectingLauncher::new(store.clone());

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    supervisor.tick().await.unwrap();

    // Both peers were missing; by the time the launcher ran, each record had
    // already been refreshed to the current tick's time.
    let records = launcher.records_at_spawn.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    for (_, seen) in records {
        assert_eq!(seen, Ok(77_000));
    }
}

#[tokio::test]
async fn refresh_can_be_disabled() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(77_000);
    let launcher = InspectingLauncher::new(store.clone());

    let mut cfg = config(1_000);
    cfg.refresh_before_spawn = false;

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        cfg,
    );

    supervisor.tick().await.unwrap();

    // With the heuristic off, missing peers still have no record at spawn.
    let records = launcher.records_at_spawn.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    for (_, seen) in records {
        assert!(seen.is_err());
    }
}

#[tokio::test]
async fn spawn_failure_does_not_abort_the_tick() {
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(10_000);
    let launcher = FailingLauncher::default();

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock.clone()),
        config(1_000),
    );

    // First tick: both peers attempted despite every spawn failing.
    supervisor.tick().await.unwrap();
    assert_eq!(launcher.attempts.lock().unwrap().len(), 2);

    // The peers were refreshed before the failed spawns, so step past the
    // staleness window and verify the next tick retries both.
    clock.advance(2_001);
    supervisor.tick().await.unwrap();
    assert_eq!(launcher.attempts.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn peer_read_failure_is_treated_as_stale() {
    let inner = MemoryLivenessStore::new();
    inner.record(&key("beta"), 9_999).await.unwrap();

    let store = FlakyStore {
        inner: inner.clone(),
        fail_writes_to: None,
        fail_reads_from: Some(key("beta")),
    };
    let clock = ManualClock::new(10_000);
    let launcher = RecordingLauncher::default();

    let mut cfg = config(1_000);
    cfg.refresh_before_spawn = false;

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        cfg,
    );

    supervisor.tick().await.unwrap();

    // beta is unreadable -> resurrected; gamma is merely missing -> also
    // resurrected. The unreadable peer never aborted the pass.
    assert_eq!(launcher.count_for("beta"), 1);
    assert_eq!(launcher.count_for("gamma"), 1);
}

#[tokio::test]
async fn failing_to_assert_own_liveness_is_fatal() {
    let store = FlakyStore {
        inner: MemoryLivenessStore::new(),
        fail_writes_to: Some(key("alpha")),
        fail_reads_from: None,
    };
    let clock = ManualClock::new(10_000);
    let launcher = RecordingLauncher::default();

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store),
        Arc::new(launcher.clone()),
        Arc::new(clock),
        config(1_000),
    );

    let err = supervisor.tick().await.unwrap_err();
    assert!(err.to_string().contains("own liveness"));

    // No peer processing happened after the fatal self-write.
    assert!(launcher.requests().is_empty());
}

#[tokio::test]
async fn lone_survivor_resurrects_both_peers_exactly_once_over_three_seconds() {
    // Group {alpha, beta, gamma}, tick 1s, K = 2; only alpha is running.
    let store = MemoryLivenessStore::new();
    let clock = ManualClock::new(0);
    let launcher = InspectingLauncher::new(store.clone());

    let supervisor = Supervisor::with_clock(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher.clone()),
        Arc::new(clock.clone()),
        config(1_000),
    );

    // Three seconds of ticks at t = 1s, 2s, 3s.
    for _ in 0..3 {
        clock.advance(1_000);
        supervisor.tick().await.unwrap();
    }

    // Both peers were resurrected exactly once, on the first tick: the
    // pre-spawn refresh kept them inside the 2s staleness window afterwards.
    let records = launcher.records_at_spawn.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    let mut peers: Vec<&str> = records.iter().map(|(p, _)| p.as_str()).collect();
    peers.sort_unstable();
    assert_eq!(peers, ["beta", "gamma"]);

    // Each spawn was preceded by a fresh record for that peer.
    for (_, seen) in &records {
        assert_eq!(*seen, Ok(1_000));
    }
}

#[tokio::test]
async fn run_stops_on_cancellation() {
    let store = MemoryLivenessStore::new();
    let launcher = RecordingLauncher::default();
    let supervisor = Arc::new(Supervisor::new(
        identity(0),
        Arc::new(store.clone()),
        Arc::new(launcher),
        config(10),
    ));

    let cancel = CancellationToken::new();
    let handle = {
        let supervisor = supervisor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { supervisor.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("supervisor did not stop after cancellation")
        .unwrap();
    result.unwrap();

    // The loop ran at least one tick before stopping.
    assert!(store.last_seen(&key("alpha")).await.is_ok());
}
