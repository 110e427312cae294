//! Transport trait abstraction for pluggable connection backends
//!
//! A transport opens one duplex, message-oriented connection and reports
//! what happens to it through an [`EventSink`]. The connection task owns the
//! returned [`TransportLink`] and is the only code that sends, closes or
//! replaces it.

use anyhow::Result;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Open,
    /// Something went wrong; a `Close` follows
    Error(String),
    /// Connection gone
    Close(String),
    /// One inbound frame
    Message(Bytes),
}

/// A transport event tagged with the connection that produced it
#[derive(Debug, Clone)]
pub struct TransportEnvelope {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Registered event handler for one connection
///
/// Cloned into whatever task drives the connection. Once detached, events
/// are silently discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
    attached: Arc<AtomicBool>,
}

impl EventSink {
    /// Register a handler for connection `generation`
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TransportEnvelope>) -> Self {
        Self {
            generation,
            tx,
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Deliver an event. Returns false if the handler is detached or gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.tx
            .send(TransportEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Deregister; affects every clone
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

/// Handle to one open (or opening) connection
pub trait TransportLink: Send {
    /// Queue one outbound frame
    fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Stop delivering events for this connection
    fn detach(&mut self);

    /// Close the connection; a `Close` event follows unless detached
    fn close(&mut self);
}

/// Factory for transport connections
pub trait TransportConnector: Send + Sync {
    /// Start opening `uri`; progress is reported through `events`
    fn open(&self, uri: &str, events: EventSink) -> Box<dyn TransportLink>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_sink_drops_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);
        let clone = sink.clone();

        assert!(clone.emit(TransportEvent::Open));
        let envelope = rx.try_recv().expect("event delivered");
        assert_eq!(envelope.generation, 7);
        assert_eq!(envelope.event, TransportEvent::Open);

        sink.detach();
        assert!(!clone.is_attached());
        assert!(!clone.emit(TransportEvent::Close("bye".into())));
        assert!(rx.try_recv().is_err());
    }
}
