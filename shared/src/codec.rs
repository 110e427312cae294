//! JSON codec for board frames
//!
//! Every frame is one JSON object:
//! ```text
//! { "cmd": "set_channel", "id": 1, "state": true, "msgid": 7 }
//! ```
//!
//! `msgid` is present only on confirmation-required commands. Framing is left
//! to the transport (one WebSocket message per frame).

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::message::{Command, ControlFields, InboundFrame, WireCommand};

/// Maximum inbound frame size (1 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a command, appending `msgid` when given
pub fn encode(command: &Command, msgid: Option<u64>) -> Result<Bytes, CodecError> {
    let encoded = serde_json::to_vec(&WireCommand { command, msgid })?;
    Ok(Bytes::from(encoded))
}

/// Decode an inbound frame
pub fn decode(frame: &[u8]) -> Result<InboundFrame, CodecError> {
    if frame.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(frame.len()));
    }

    let value: Value = serde_json::from_slice(frame)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }

    let control = ControlFields::from_value(&value);
    Ok(InboundFrame { value, control })
}
