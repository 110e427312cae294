//! Yarrboard Shared Protocol Types
//!
//! This crate provides the wire types, JSON codec and connection state machine
//! shared by the Yarrboard client and its tooling.

pub mod codec;
pub mod message;
pub mod state_machine;

// Re-export commonly used types at crate root
pub use message::{Command, ControlFields, InboundFrame, Signal};
pub use state_machine::ConnectionState;

/// Protocol parameters and signal vocabulary
pub mod protocol {
    use std::time::Duration;

    /// Default interval between heartbeat probes
    pub const DEFAULT_HEARTBEAT_RATE: Duration = Duration::from_millis(1000);

    /// Heartbeat periods without inbound traffic before the link is declared dead
    pub const MISSED_HEARTBEAT_THRESHOLD: u32 = 3;

    /// Default time to wait for a confirmation before resending
    pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Transmissions of a confirmation-required message before it is abandoned
    pub const MAX_SEND_ATTEMPTS: u32 = 3;

    /// Lower bound on the reconnect backoff
    pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(500);

    /// Upper bound on the reconnect backoff
    pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

    /// Overload increment range in milliseconds, `[min, max)`
    pub const OVERLOAD_INCREMENT_MS: std::ops::Range<u64> = 25..50;

    /// Overload signal carried in the `error` field
    pub const QUEUE_FULL: &str = "Queue Full";

    /// Legacy overload signal carried in `message` with an error status
    pub const WEBSOCKET_BUSY: &str = "Websocket busy, throttle connection.";

    /// `msg` value announcing firmware update progress
    pub const OTA_PROGRESS: &str = "ota_progress";

    /// Reply status values
    pub const STATUS_SUCCESS: &str = "success";
    pub const STATUS_ERROR: &str = "error";
}

/// Builder helpers for the board command vocabulary
impl Command {
    /// Authenticate the connection
    pub fn login(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self::new("login").arg("user", user.into()).arg("pass", pass.into())
    }

    /// Request the board configuration
    pub fn get_config() -> Self {
        Self::new("get_config")
    }

    /// Heartbeat probe
    pub fn ping() -> Self {
        Self::new("ping")
    }

    /// Switch a channel on or off
    pub fn set_channel_state(id: u32, state: bool) -> Self {
        Self::new("set_channel").arg("id", id).arg("state", state)
    }

    /// Set a channel's duty cycle (0.0 - 1.0)
    pub fn set_channel_duty(id: u32, duty: f64) -> Self {
        Self::new("set_channel").arg("id", id).arg("duty", duty)
    }

    /// Toggle a channel
    pub fn toggle_channel(id: u32) -> Self {
        Self::new("toggle_channel").arg("id", id)
    }

    /// Fade a channel to `duty` over `millis` milliseconds
    pub fn fade_channel(id: u32, duty: f64, millis: u64) -> Self {
        Self::new("fade_channel")
            .arg("id", id)
            .arg("duty", duty)
            .arg("millis", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_creation() {
        let cmd = Command::login("admin", "secret");
        assert_eq!(cmd.name(), "login");
        assert_eq!(cmd.get("user"), Some(&json!("admin")));
        assert_eq!(cmd.get("pass"), Some(&json!("secret")));
    }

    #[test]
    fn test_channel_commands() {
        let cmd = Command::set_channel_duty(3, 0.5);
        assert_eq!(cmd.name(), "set_channel");
        assert_eq!(cmd.get("duty"), Some(&json!(0.5)));
        assert!(cmd.get("state").is_none());

        let cmd = Command::fade_channel(2, 1.0, 250);
        assert_eq!(cmd.name(), "fade_channel");
        assert_eq!(cmd.get("millis"), Some(&json!(250)));
    }

    #[test]
    fn test_liveness_deadline_exceeds_probe_interval() {
        assert!(protocol::MISSED_HEARTBEAT_THRESHOLD > 1);
        assert!(protocol::MIN_RECONNECT_DELAY < protocol::MAX_RECONNECT_DELAY);
    }
}
