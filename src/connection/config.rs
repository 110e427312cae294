//! Client configuration

use std::time::Duration;
use thiserror::Error;
use yarrboard_shared::protocol;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("heartbeat rate must be non-zero")]
    ZeroHeartbeatRate,

    #[error("message timeout must be non-zero")]
    ZeroMessageTimeout,

    #[error("connect timeout must be non-zero")]
    ZeroConnectTimeout,

    #[error("minimum backpressure delay must be non-zero")]
    ZeroMinDelay,

    #[error("backpressure delay bounds are inverted: {min:?} > {max:?}")]
    InvertedDelayBounds { min: Duration, max: Duration },
}

/// Configuration for a board client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Board hostname (and optional port), e.g. `yarrboard.local`
    pub hostname: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Send a login command after every successful open
    pub require_login: bool,
    /// Connect with `wss://` instead of `ws://`
    pub use_ssl: bool,
    /// Heartbeat probe interval; also the reconnect backoff unit
    pub heartbeat_rate: Duration,
    /// Time to wait for a confirmation before resending
    pub message_timeout: Duration,
    /// Time allowed for the WebSocket handshake before the attempt counts as closed
    pub connect_timeout: Duration,
    /// Reconnect attempts before giving up (0 = retry forever)
    pub max_connection_retries: u32,
    /// Lower bound of the inter-send delay
    pub min_backpressure_delay: Duration,
    /// Upper bound of the inter-send delay
    pub max_backpressure_delay: Duration,
    /// Amount the inter-send delay relaxes every delivery cycle
    pub backpressure_decay: Duration,
    /// Request the board configuration after every successful open
    pub fetch_config_on_open: bool,
    /// Log message rates at this interval
    pub stats_interval: Option<Duration>,
    /// Seed for the backpressure jitter (random when unset)
    pub rng_seed: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: "yarrboard.local".into(),
            username: "admin".into(),
            password: "admin".into(),
            require_login: true,
            use_ssl: false,
            heartbeat_rate: protocol::DEFAULT_HEARTBEAT_RATE,
            message_timeout: protocol::DEFAULT_MESSAGE_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            max_connection_retries: 0,
            min_backpressure_delay: Duration::from_millis(10),
            max_backpressure_delay: Duration::from_millis(500),
            backpressure_decay: Duration::from_millis(5),
            fetch_config_on_open: true,
            stats_interval: None,
            rng_seed: None,
        }
    }
}

impl ClientConfig {
    /// WebSocket endpoint of the board
    pub fn uri(&self) -> String {
        let scheme = if self.use_ssl { "wss" } else { "ws" };
        format!("{}://{}/ws", scheme, self.hostname)
    }

    /// Short board name: the first label of the hostname
    pub fn board_name(&self) -> &str {
        self.hostname.split('.').next().unwrap_or(&self.hostname)
    }

    /// Silence after which a connected board is declared dead
    pub fn liveness_deadline(&self) -> Duration {
        self.heartbeat_rate
            .saturating_mul(protocol::MISSED_HEARTBEAT_THRESHOLD)
    }

    /// Check the configuration for values the client cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if self.heartbeat_rate.is_zero() {
            return Err(ConfigError::ZeroHeartbeatRate);
        }
        if self.message_timeout.is_zero() {
            return Err(ConfigError::ZeroMessageTimeout);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        if self.min_backpressure_delay.is_zero() {
            return Err(ConfigError::ZeroMinDelay);
        }
        if self.min_backpressure_delay > self.max_backpressure_delay {
            return Err(ConfigError::InvertedDelayBounds {
                min: self.min_backpressure_delay,
                max: self.max_backpressure_delay,
            });
        }
        Ok(())
    }
}
