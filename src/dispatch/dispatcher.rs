//! Inbound dispatcher - decodes board frames and routes control signals

use crate::delivery::{AckOutcome, DeliveryEngine};
use crate::gate::UpdateGate;
use crate::liveness::LivenessMonitor;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};
use yarrboard_shared::{codec, Signal};

/// Components an inbound frame can act on
pub struct DispatchContext<'a> {
    pub engine: &'a mut DeliveryEngine,
    pub liveness: &'a mut LivenessMonitor,
    pub gate: &'a mut UpdateGate,
}

/// What became of an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Could not be decoded; dropped
    Malformed,
    /// Protocol-control signal handled internally
    Consumed(Signal),
    /// Belongs to the application
    Forward(Value),
}

/// Routes inbound frames
#[derive(Debug, Default)]
pub struct InboundDispatcher {
    malformed: u64,
    unexpected_acks: u64,
}

impl InboundDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one raw frame from the transport
    pub fn dispatch(&mut self, raw: &[u8], now: Instant, ctx: DispatchContext<'_>) -> Dispatch {
        let frame = match codec::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.malformed += 1;
                warn!("Message error: {}", e);
                return Dispatch::Malformed;
            }
        };

        ctx.liveness.touch(now);

        if let Some(msgid) = frame.control.msgid {
            match ctx.engine.acknowledge(msgid) {
                AckOutcome::Acknowledged => debug!("Message {} confirmed", msgid),
                AckOutcome::Unexpected { pending } => {
                    self.unexpected_acks += 1;
                    warn!("Unexpected ack for message {} (pending: {:?})", msgid, pending);
                }
            }
        }

        let message = frame.control.message.as_deref().unwrap_or_default();
        if frame.control.is_error() {
            warn!("Error: {}", message);
        } else if frame.control.is_success() {
            debug!("Success: {}", message);
        }

        match frame.signal() {
            signal @ Signal::HeartbeatReply => Dispatch::Consumed(signal),
            signal @ Signal::Overload => {
                let delay = ctx.engine.overload();
                info!("Throttling: {}ms", delay.as_millis());
                Dispatch::Consumed(signal)
            }
            Signal::UpdateProgress { progress } => {
                if ctx.gate.engage(progress) {
                    info!("Firmware update in progress, suspending sends");
                }
                debug!("Update progress: {}%", progress);
                Dispatch::Forward(frame.value)
            }
            Signal::Payload => Dispatch::Forward(frame.value),
        }
    }

    /// Frames that failed to decode
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Acknowledgments that matched no pending send
    pub fn unexpected_acks(&self) -> u64 {
        self.unexpected_acks
    }
}
