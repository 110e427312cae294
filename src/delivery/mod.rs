//! Outbound delivery for the board connection
//!
//! This module handles:
//! - Queueing commands in FIFO order
//! - Correlation ids and confirmation tracking (one in flight)
//! - Resend on timeout with a bounded attempt count
//! - Adaptive spacing between sends (backpressure)

mod backpressure;
mod engine;

pub use backpressure::Backpressure;
pub use engine::{
    AckOutcome, DeliveryEngine, DrainAction, OutboundMessage, PendingSend, SendOutcome,
};
