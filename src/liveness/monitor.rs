//! Liveness Monitor
//!
//! Tracks the time of the last inbound frame. A connection that stays open
//! at the transport level but goes silent for longer than the deadline is
//! declared dead; the transport's own events never surface that case.

use std::time::{Duration, Instant};

/// Result of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// No traffic for `silent_for`, longer than the deadline
    Dead { silent_for: Duration },
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    last_traffic: Instant,
    deadline: Duration,
}

impl LivenessMonitor {
    /// Create a monitor that treats `now` as the last traffic and declares
    /// the link dead after more than `deadline` of silence
    pub fn new(deadline: Duration, now: Instant) -> Self {
        Self {
            last_traffic: now,
            deadline,
        }
    }

    /// Record inbound traffic
    pub fn touch(&mut self, now: Instant) {
        self.last_traffic = now;
    }

    /// Start a fresh window, e.g. after a connect
    pub fn reset(&mut self, now: Instant) {
        self.last_traffic = now;
    }

    #[cfg(test)]
    pub fn last_traffic(&self) -> Instant {
        self.last_traffic
    }

    /// Compare the silence so far against the deadline
    pub fn check(&self, now: Instant) -> Liveness {
        let silent_for = now.saturating_duration_since(self.last_traffic);
        if silent_for > self.deadline {
            Liveness::Dead { silent_for }
        } else {
            Liveness::Alive
        }
    }
}
