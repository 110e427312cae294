//! Connection State Machine
//!
//! Defines valid connection lifecycle transitions and the reconnect backoff.

use std::fmt;
use std::time::Duration;

use crate::protocol;

/// Lifecycle state of a board connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport, or closed by the user
    #[default]
    Idle,
    /// First attempt, no successful open yet
    Connecting,
    /// Transport open and healthy
    Connected,
    /// Re-establishing after a close
    Retrying,
    /// Retry budget exhausted
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "IDLE",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Retrying => "RETRYING",
            ConnectionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// User asked to connect
    Start,
    /// Transport reported open
    Opened,
    /// Transport reported close (including forced closes)
    Closed,
    /// User asked to close
    Shutdown,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(ConnectionState),
    /// Connection lost; a new transport should be created after `delay`
    Reconnect { attempt: u32, delay: Duration },
    /// Retry budget exhausted
    Failed { attempts: u32 },
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: LifecycleEvent,
    },
}

/// The connection lifecycle state machine
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    current_state: ConnectionState,
    retry_count: u32,
    /// 0 = unbounded
    max_retries: u32,
    heartbeat_rate: Duration,
}

impl ConnectionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new(max_retries: u32, heartbeat_rate: Duration) -> Self {
        Self {
            current_state: ConnectionState::Idle,
            retry_count: 0,
            max_retries,
            heartbeat_rate,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// Reconnect attempts since the last successful open
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LifecycleEvent) -> TransitionResult {
        use ConnectionState::*;

        match (self.current_state, event) {
            (_, LifecycleEvent::Shutdown) => {
                self.retry_count = 0;
                self.current_state = Idle;
                TransitionResult::Success(Idle)
            }

            (Idle | Failed, LifecycleEvent::Start) => {
                self.retry_count = 0;
                self.current_state = Connecting;
                TransitionResult::Success(Connecting)
            }

            (Connecting | Retrying, LifecycleEvent::Opened) => {
                self.retry_count = 0;
                self.current_state = Connected;
                TransitionResult::Success(Connected)
            }

            (Connecting | Connected | Retrying, LifecycleEvent::Closed) => {
                if self.max_retries > 0 && self.retry_count >= self.max_retries {
                    self.current_state = Failed;
                    return TransitionResult::Failed {
                        attempts: self.retry_count,
                    };
                }

                self.retry_count += 1;
                self.current_state = Retrying;
                TransitionResult::Reconnect {
                    attempt: self.retry_count,
                    delay: backoff_delay(self.retry_count, self.heartbeat_rate),
                }
            }

            (from, event) => TransitionResult::Invalid { from, event },
        }
    }
}

/// Delay before reconnect attempt `retry_count`:
/// `clamp(retry_count × heartbeat_rate, 500ms, 60s)`
pub fn backoff_delay(retry_count: u32, heartbeat_rate: Duration) -> Duration {
    heartbeat_rate
        .saturating_mul(retry_count)
        .clamp(protocol::MIN_RECONNECT_DELAY, protocol::MAX_RECONNECT_DELAY)
}

/// Check if a transition from one state to another is valid
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        // Same state is always valid
        (a, b) if a == b => true,

        // Explicit close is allowed from anywhere
        (_, Idle) => true,

        (Idle, Connecting) => true,
        (Failed, Connecting) => true, // Explicit restart
        (Connecting, Connected) => true,
        (Connecting, Retrying | Failed) => true, // First attempt never opened
        (Connected, Retrying | Failed) => true,
        (Retrying, Connected | Failed) => true,

        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [LifecycleEvent; 4] = [
        LifecycleEvent::Start,
        LifecycleEvent::Opened,
        LifecycleEvent::Closed,
        LifecycleEvent::Shutdown,
    ];

    fn fsm(max_retries: u32) -> ConnectionStateMachine {
        ConnectionStateMachine::new(max_retries, Duration::from_millis(500))
    }

    #[test]
    fn test_initial_state() {
        let fsm = fsm(0);
        assert_eq!(fsm.state(), ConnectionState::Idle);
        assert_eq!(fsm.retry_count(), 0);
    }

    #[test]
    fn test_normal_connection_flow() {
        let mut fsm = fsm(0);

        let result = fsm.process_event(LifecycleEvent::Start);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Connecting));

        let result = fsm.process_event(LifecycleEvent::Opened);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Connected));

        let result = fsm.process_event(LifecycleEvent::Closed);
        assert!(matches!(result, TransitionResult::Reconnect { attempt: 1, .. }));
        assert_eq!(fsm.state(), ConnectionState::Retrying);

        let result = fsm.process_event(LifecycleEvent::Opened);
        assert_eq!(result, TransitionResult::Success(ConnectionState::Connected));
        assert_eq!(fsm.retry_count(), 0);
    }

    #[test]
    fn test_unbounded_backoff_sequence() {
        let mut fsm = fsm(0);
        fsm.process_event(LifecycleEvent::Start);
        fsm.process_event(LifecycleEvent::Opened);

        let mut delays = Vec::new();
        for _ in 0..200 {
            match fsm.process_event(LifecycleEvent::Closed) {
                TransitionResult::Reconnect { delay, .. } => delays.push(delay.as_millis()),
                other => panic!("unexpected transition: {other:?}"),
            }
        }

        assert_eq!(&delays[..4], &[500, 1000, 1500, 2000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().expect("delays"), 60_000);
        assert_eq!(fsm.state(), ConnectionState::Retrying);
    }

    #[test]
    fn test_backoff_bounds() {
        let rate = Duration::from_millis(100);
        assert_eq!(backoff_delay(1, rate), Duration::from_millis(500));
        assert_eq!(backoff_delay(7, rate), Duration::from_millis(700));
        assert_eq!(backoff_delay(u32::MAX, rate), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_budget_exhaustion() {
        let mut fsm = fsm(2);
        fsm.process_event(LifecycleEvent::Start);

        assert!(matches!(
            fsm.process_event(LifecycleEvent::Closed),
            TransitionResult::Reconnect { attempt: 1, .. }
        ));
        assert!(matches!(
            fsm.process_event(LifecycleEvent::Closed),
            TransitionResult::Reconnect { attempt: 2, .. }
        ));
        assert_eq!(
            fsm.process_event(LifecycleEvent::Closed),
            TransitionResult::Failed { attempts: 2 }
        );
        assert_eq!(fsm.state(), ConnectionState::Failed);

        // Terminal until an explicit start
        assert!(matches!(
            fsm.process_event(LifecycleEvent::Closed),
            TransitionResult::Invalid { .. }
        ));
        assert!(matches!(
            fsm.process_event(LifecycleEvent::Opened),
            TransitionResult::Invalid { .. }
        ));
        assert_eq!(
            fsm.process_event(LifecycleEvent::Start),
            TransitionResult::Success(ConnectionState::Connecting)
        );
        assert_eq!(fsm.retry_count(), 0);
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = fsm(0);

        // Can't open without starting
        let result = fsm.process_event(LifecycleEvent::Opened);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), ConnectionState::Idle);

        // Start is not re-entrant
        fsm.process_event(LifecycleEvent::Start);
        let result = fsm.process_event(LifecycleEvent::Start);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
    }

    #[test]
    fn test_every_reachable_transition_is_valid() {
        // Exhaustive over all event sequences of length 6
        let total = EVENTS.len().pow(6);
        for mut code in 0..total {
            let mut fsm = fsm(2);
            for _ in 0..6 {
                let event = EVENTS[code % EVENTS.len()];
                code /= EVENTS.len();

                let from = fsm.state();
                fsm.process_event(event);
                let to = fsm.state();
                assert!(
                    is_valid_transition(from, to),
                    "{from} -> {to} via {event:?}"
                );
            }
        }
    }
}
