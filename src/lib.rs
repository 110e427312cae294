//! Yarrboard Client
//!
//! A resilient messaging client for Yarrboard boards: one persistent
//! WebSocket connection with automatic reconnection, confirmed delivery of
//! commands, adaptive backpressure, heartbeat liveness detection and a gate
//! that holds traffic while the board updates its firmware.

pub mod connection;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod handler;
pub mod liveness;
pub mod scheduler;
pub mod stats;
pub mod transport;

pub use connection::{ClientConfig, ConfigError, YarrboardClient};
pub use delivery::SendOutcome;
pub use error::ClientError;
pub use handler::{ClientHandler, LoggingHandler};
pub use stats::MessageStats;
pub use yarrboard_shared::{Command, ConnectionState};
