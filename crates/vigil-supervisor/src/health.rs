//! Peer health classification
//!
//! Derived fresh every tick from the age of a peer's liveness record; never
//! cached across ticks.

/// Health of one peer as judged from its liveness record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerHealth {
    /// Record age within the staleness threshold
    Alive,
    /// Record older than the threshold
    Stale,
    /// No record was ever written for this peer
    Missing,
}

impl PeerHealth {
    /// Classify a record of `age_ms` against `threshold_ms`.
    /// The threshold is exclusive: a record aged exactly `threshold_ms` is
    /// still alive.
    pub fn classify(age_ms: i64, threshold_ms: i64) -> Self {
        if age_ms > threshold_ms {
            Self::Stale
        } else {
            Self::Alive
        }
    }

    /// Stale and missing peers are both candidates for resurrection
    pub fn needs_resurrection(self) -> bool {
        matches!(self, Self::Stale | Self::Missing)
    }
}
