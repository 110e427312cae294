//! Wire message types
//!
//! Outbound commands are JSON objects keyed by `cmd`. The client appends a
//! `msgid` to commands that need confirmation; the board echoes it back in
//! its reply. Inbound frames are arbitrary JSON objects, of which only a few
//! fields drive delivery control.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol;

/// Keys owned by the envelope; command arguments may not shadow them.
const RESERVED_KEYS: [&str; 2] = ["cmd", "msgid"];

/// An outbound board command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    cmd: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Command {
    /// Create a command with no arguments
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            fields: Map::new(),
        }
    }

    /// Add an argument. Reserved envelope keys (`cmd`, `msgid`) are ignored.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// The command name (`cmd` field)
    pub fn name(&self) -> &str {
        &self.cmd
    }

    /// Look up an argument by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Serialized form of a command on the wire
#[derive(Debug, Serialize)]
pub(crate) struct WireCommand<'a> {
    #[serde(flatten)]
    pub command: &'a Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msgid: Option<u64>,
}

/// Fields of an inbound frame that the delivery layer acts on
///
/// Extracted leniently: a field with an unexpected type reads as absent and
/// the frame is still handed to the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFields {
    /// Correlation id echoed from a confirmation-required send
    pub msgid: Option<u64>,
    /// `"success"` or `"error"` on command replies
    pub status: Option<String>,
    /// Human-readable detail accompanying `status`
    pub message: Option<String>,
    /// Message kind, e.g. `"ota_progress"`
    pub msg: Option<String>,
    /// Firmware update progress, 0-100
    pub progress: Option<u32>,
    /// Error signal, e.g. `"Queue Full"`
    pub error: Option<String>,
    /// Heartbeat reply marker
    pub pong: Option<bool>,
}

/// Protocol-control meaning of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Reply to a heartbeat probe
    HeartbeatReply,
    /// The board asked us to slow down
    Overload,
    /// The board is applying a firmware update
    UpdateProgress { progress: u32 },
    /// Not a control signal; belongs to the application
    Payload,
}

impl ControlFields {
    /// Pull the control fields out of a decoded JSON object
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);

        Self {
            msgid: value.get("msgid").and_then(Value::as_u64),
            status: text("status"),
            message: text("message"),
            msg: text("msg"),
            progress: value.get("progress").and_then(percent),
            error: text("error"),
            pong: value.get("pong").map(is_truthy),
        }
    }

    /// Whether the reply reports an error status
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some(protocol::STATUS_ERROR)
    }

    /// Whether the reply reports a success status
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(protocol::STATUS_SUCCESS)
    }

    /// Classify the frame
    pub fn signal(&self) -> Signal {
        if self.pong == Some(true) {
            return Signal::HeartbeatReply;
        }

        let queue_full = self.error.as_deref() == Some(protocol::QUEUE_FULL);
        let busy = self.is_error() && self.message.as_deref() == Some(protocol::WEBSOCKET_BUSY);
        if queue_full || busy {
            return Signal::Overload;
        }

        if self.msg.as_deref() == Some(protocol::OTA_PROGRESS) {
            return Signal::UpdateProgress {
                progress: self.progress.unwrap_or(0),
            };
        }

        Signal::Payload
    }
}

/// Progress as a whole percentage; fractional values are truncated
fn percent(value: &Value) -> Option<u32> {
    let progress = value.as_f64()?;
    if !progress.is_finite() {
        return None;
    }
    Some(progress.clamp(0.0, 100.0) as u32)
}

/// Loose truthiness for flag fields: `1` and `"yes"` count, `0` and `""` do not
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// The full JSON object, forwarded verbatim to the application
    pub value: Value,
    /// Delivery-control fields extracted from `value`
    pub control: ControlFields,
}

impl InboundFrame {
    /// Classify the frame
    pub fn signal(&self) -> Signal {
        self.control.signal()
    }
}
