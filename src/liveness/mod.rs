//! Liveness Module
//!
//! Detects a connection that is open but silent and asks the lifecycle
//! manager to replace it.

mod monitor;

pub use monitor::{Liveness, LivenessMonitor};
