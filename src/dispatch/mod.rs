//! Inbound frame handling
//!
//! This module handles:
//! - Decoding board frames (malformed frames are logged and dropped)
//! - Matching acknowledgments to the pending send
//! - Heartbeat replies, overload and firmware-update signals
//! - Forwarding everything else to the application

mod dispatcher;

pub use dispatcher::{Dispatch, DispatchContext, InboundDispatcher};
