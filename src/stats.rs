//! Message counters and rates

use std::time::Instant;

/// Snapshot of message traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageStats {
    /// Frames received since the client was created
    pub received: u64,
    /// Frames transmitted since the client was created
    pub sent: u64,
    /// Received frames per second since the last sample
    pub received_per_sec: u64,
    /// Sent frames per second since the last sample
    pub sent_per_sec: u64,
}

#[derive(Debug, Clone)]
pub struct StatsTracker {
    received: u64,
    sent: u64,
    last_received: u64,
    last_sent: u64,
    last_sample: Instant,
}

impl StatsTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            received: 0,
            sent: 0,
            last_received: 0,
            last_sent: 0,
            last_sample: now,
        }
    }

    pub fn record_received(&mut self) {
        self.received += 1;
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Current counters and rates, without starting a new window
    pub fn snapshot(&self, now: Instant) -> MessageStats {
        let elapsed_ms = now.saturating_duration_since(self.last_sample).as_millis() as f64;
        let rate = |delta: u64| {
            if elapsed_ms > 0.0 {
                (delta as f64 / elapsed_ms * 1000.0).round() as u64
            } else {
                0
            }
        };

        MessageStats {
            received: self.received,
            sent: self.sent,
            received_per_sec: rate(self.received - self.last_received),
            sent_per_sec: rate(self.sent - self.last_sent),
        }
    }

    /// Take a snapshot and start a new rate window
    pub fn sample(&mut self, now: Instant) -> MessageStats {
        let stats = self.snapshot(now);
        self.last_received = self.received;
        self.last_sent = self.sent;
        self.last_sample = now;
        stats
    }
}
