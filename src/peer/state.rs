use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ========== SESSION STATE ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Negotiating,
    Answered,
    Bound,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    /// Whether `self -> next` is an edge of the session state machine.
    /// Disconnected only ever leads to a terminal state.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Created, Negotiating)
            | (Negotiating, Answered)
            | (Answered, Bound)
            | (Bound, Connected) => true,
            (Disconnected, Disconnected) => false,
            (_, Disconnected) | (_, Failed) | (_, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Negotiating => "negotiating",
            SessionState::Answered => "answered",
            SessionState::Bound => "bound",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Diagnostic record emitted for every applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub previous: SessionState,
    pub next: SessionState,
}

// ========== PROCESS-WIDE COUNTERS ==========

#[derive(Debug, Default)]
pub struct GatewayStats {
    started: AtomicU64,
    failed: AtomicU64,
    active: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sessions_started: u64,
    pub sessions_failed: u64,
    pub sessions_active: u64,
}

impl GatewayStats {
    pub fn session_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_released(&self) {
        // Saturates at zero.
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_started: self.started.load(Ordering::Relaxed),
            sessions_failed: self.failed.load(Ordering::Relaxed),
            sessions_active: self.active.load(Ordering::Relaxed),
        }
    }
}

pub static STATS: Lazy<GatewayStats> = Lazy::new(GatewayStats::default);
