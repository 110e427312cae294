//! Connection management for a single Yarrboard board
//!
//! This module handles:
//! - Client configuration and validation
//! - The lifecycle state machine with reconnect backoff
//! - The session tying delivery, liveness and the update gate together
//! - The background task and the handle applications talk to

mod config;
mod manager;
mod session;

pub use config::{ClientConfig, ConfigError};
pub use manager::YarrboardClient;
pub use session::Session;
