//! Outbound delivery engine - ordered sends with confirmation and bounded retry

use super::backpressure::Backpressure;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use yarrboard_shared::codec::{self, CodecError};
use yarrboard_shared::{protocol, Command};

/// A command waiting in the send queue
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub command: Command,
    /// Correlation id; set only for confirmation-required messages
    pub msgid: Option<u64>,
    pub enqueued_at: Instant,
    /// Encoded wire frame, reused verbatim on resend
    frame: Bytes,
}

/// The single confirmation-required message in flight
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub message: OutboundMessage,
    pub msgid: u64,
    pub sent_at: Instant,
    pub retry_count: u32,
}

/// Result of handing a command to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for delivery
    Queued { msgid: Option<u64> },
    /// Fire-and-forget command dropped because the queue was busy
    Dropped,
}

/// What one delivery cycle wants put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainAction {
    /// Nothing to do this cycle
    Idle,
    /// First transmission of the queue head
    Send { msgid: Option<u64>, frame: Bytes },
    /// Retransmission of the pending message after a timeout
    Resend { msgid: u64, attempt: u32, frame: Bytes },
    /// Pending message gave up after the final timeout
    Abandon { msgid: u64 },
}

/// Result of matching an acknowledgment against the pending send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acknowledged,
    /// No pending send carries this id
    Unexpected { pending: Option<u64> },
}

/// Owns the send queue and the pending confirmation
#[derive(Debug)]
pub struct DeliveryEngine {
    queue: VecDeque<OutboundMessage>,
    pending: Option<PendingSend>,
    last_msgid: u64,
    message_timeout: Duration,
    backpressure: Backpressure,
}

impl DeliveryEngine {
    /// Create a new delivery engine
    pub fn new(message_timeout: Duration, backpressure: Backpressure) -> Self {
        Self {
            queue: VecDeque::new(),
            pending: None,
            last_msgid: 0,
            message_timeout,
            backpressure,
        }
    }

    /// Queue a command for delivery
    ///
    /// Confirmation-required commands get a fresh correlation id and are
    /// always queued. Fire-and-forget commands are only queued when nothing
    /// else is waiting, so they cannot pile up behind a slow board.
    pub fn send(
        &mut self,
        command: Command,
        require_confirmation: bool,
        now: Instant,
    ) -> Result<SendOutcome, CodecError> {
        if !require_confirmation && !self.queue.is_empty() {
            debug!(
                "Dropping {} ({} queued)",
                command.name(),
                self.queue.len()
            );
            return Ok(SendOutcome::Dropped);
        }

        let msgid = if require_confirmation {
            self.last_msgid += 1;
            Some(self.last_msgid)
        } else {
            None
        };

        let frame = codec::encode(&command, msgid)?;
        self.queue.push_back(OutboundMessage {
            command,
            msgid,
            enqueued_at: now,
            frame,
        });

        Ok(SendOutcome::Queued { msgid })
    }

    /// Run one delivery cycle
    ///
    /// While a confirmation is outstanding nothing new is sent; the pending
    /// message is retransmitted on timeout and abandoned once it has been
    /// sent [`protocol::MAX_SEND_ATTEMPTS`] times.
    pub fn drain_cycle(&mut self, now: Instant) -> DrainAction {
        if let Some(pending) = self.pending.as_mut() {
            if now.saturating_duration_since(pending.sent_at) <= self.message_timeout {
                return DrainAction::Idle;
            }

            pending.retry_count += 1;
            let msgid = pending.msgid;

            if pending.retry_count >= protocol::MAX_SEND_ATTEMPTS {
                warn!(
                    "Message {} ({}) unconfirmed after {} attempts, abandoning",
                    msgid,
                    pending.message.command.name(),
                    pending.retry_count
                );
                self.pending = None;
                return DrainAction::Abandon { msgid };
            }

            pending.sent_at = now;
            let attempt = pending.retry_count + 1;
            warn!(
                "Message {} timed out, resending ({}/{})",
                msgid,
                attempt,
                protocol::MAX_SEND_ATTEMPTS
            );
            return DrainAction::Resend {
                msgid,
                attempt,
                frame: pending.message.frame.clone(),
            };
        }

        let Some(message) = self.queue.pop_front() else {
            return DrainAction::Idle;
        };

        debug!(
            "Sending {} after {}ms in queue",
            message.command.name(),
            now.saturating_duration_since(message.enqueued_at).as_millis()
        );
        let msgid = message.msgid;
        let frame = message.frame.clone();
        if let Some(id) = msgid {
            self.pending = Some(PendingSend {
                message,
                msgid: id,
                sent_at: now,
                retry_count: 0,
            });
        }

        DrainAction::Send { msgid, frame }
    }

    /// Match an inbound correlation id against the pending send
    pub fn acknowledge(&mut self, msgid: u64) -> AckOutcome {
        match &self.pending {
            Some(pending) if pending.msgid == msgid => {
                self.pending = None;
                AckOutcome::Acknowledged
            }
            other => AckOutcome::Unexpected {
                pending: other.as_ref().map(|p| p.msgid),
            },
        }
    }

    /// Relax backpressure after a cycle; returns the delay before the next one
    pub fn finish_cycle(&mut self) -> Duration {
        self.backpressure.decay()
    }

    /// React to an overload signal; returns the new delay
    pub fn overload(&mut self) -> Duration {
        self.backpressure.increase()
    }

    /// Current inter-send delay
    pub fn delay(&self) -> Duration {
        self.backpressure.current()
    }

    /// Forget queued and pending messages. Correlation ids keep counting.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending = None;
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<&PendingSend> {
        self.pending.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
