//! Delayed task queue
//!
//! Every wait in the client (delay before the next drain, heartbeat period,
//! reconnect backoff) is a task registered here. The connection task sleeps
//! until [`Scheduler::next_deadline`] and then runs whatever is due, so all
//! timer work for one client happens on a single timeline.

use std::collections::BTreeMap;
use std::time::Instant;

/// Work the connection task can be asked to do later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Run one delivery cycle
    Drain,
    /// Check liveness and enqueue a heartbeat probe
    Heartbeat,
    /// Create a new transport; stale if `epoch` no longer matches
    Reconnect { epoch: u64 },
    /// Log message rates
    Stats,
}

/// Tasks ordered by deadline, then by insertion order
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: BTreeMap<(Instant, u64), Task>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to run at `at`
    pub fn schedule(&mut self, at: Instant, task: Task) {
        self.tasks.insert((at, self.next_seq), task);
        self.next_seq += 1;
    }

    /// Earliest deadline, if anything is scheduled
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.first_key_value().map(|((at, _), _)| *at)
    }

    /// Remove and return the earliest task if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let ((at, _), _) = self.tasks.first_key_value()?;
        if *at > now {
            return None;
        }
        self.tasks.pop_first().map(|(_, task)| task)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every scheduled task
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_deadline_order() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(start + Duration::from_millis(30), Task::Heartbeat);
        scheduler.schedule(start + Duration::from_millis(10), Task::Drain);
        scheduler.schedule(start + Duration::from_millis(10), Task::Stats);

        assert_eq!(scheduler.next_deadline(), Some(start + Duration::from_millis(10)));
        assert_eq!(scheduler.pop_due(start), None);

        let now = start + Duration::from_millis(30);
        assert_eq!(scheduler.pop_due(now), Some(Task::Drain));
        assert_eq!(scheduler.pop_due(now), Some(Task::Stats));
        assert_eq!(scheduler.pop_due(now), Some(Task::Heartbeat));
        assert_eq!(scheduler.pop_due(now), None);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_clear_cancels_everything() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(start, Task::Reconnect { epoch: 1 });
        scheduler.schedule(start + Duration::from_millis(5), Task::Heartbeat);
        assert!(!scheduler.is_empty());

        scheduler.clear();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(scheduler.pop_due(start + Duration::from_secs(1)), None);
    }
}
