//! Application callbacks
//!
//! Callbacks run synchronously on the connection task, in the order the
//! underlying events happen. Keep them short; hand heavy work to another
//! task.

use serde_json::Value;
use tracing::{debug, info, warn};

/// Receives connection events and board messages
pub trait ClientHandler: Send + 'static {
    /// The transport opened and the session was reset
    fn on_open(&mut self) {}

    /// A board frame that is not a delivery-control signal
    fn on_message(&mut self, message: &Value) {
        debug!("{}", message);
    }

    /// The transport reported an error; a close follows
    fn on_error(&mut self, _info: &str) {}

    /// The transport closed
    fn on_close(&mut self, _info: &str) {}
}

/// Logs every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ClientHandler for LoggingHandler {
    fn on_open(&mut self) {
        info!("onconnect");
    }

    fn on_message(&mut self, message: &Value) {
        match message.get("msg").and_then(Value::as_str) {
            Some(kind) => info!("{}", kind),
            None => info!("{}", message),
        }
    }

    fn on_error(&mut self, info: &str) {
        warn!("onerror: {}", info);
    }

    fn on_close(&mut self, info: &str) {
        info!("onclose: {}", info);
    }
}
