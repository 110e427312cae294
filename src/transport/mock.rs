//! In-memory transport for tests
//!
//! Records every opened link and lets the test play the board's part by
//! emitting events through the link's sink.

use crate::transport::traits::{EventSink, TransportConnector, TransportEvent, TransportLink};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct LinkRecord {
    uri: String,
    events: EventSink,
    sent: Vec<Bytes>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    links: Arc<Mutex<Vec<LinkRecord>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links opened so far
    pub fn opened(&self) -> usize {
        self.links.lock().expect("mock lock").len()
    }

    pub fn uri(&self, index: usize) -> String {
        self.links.lock().expect("mock lock")[index].uri.clone()
    }

    /// Emit an event as link `index`
    pub fn emit(&self, index: usize, event: TransportEvent) -> bool {
        let sink = self.links.lock().expect("mock lock")[index].events.clone();
        sink.emit(event)
    }

    /// Emit an inbound text frame as link `index`
    pub fn receive(&self, index: usize, frame: &str) -> bool {
        self.emit(index, TransportEvent::Message(Bytes::copy_from_slice(frame.as_bytes())))
    }

    /// Frames sent on link `index`, decoded as JSON
    pub fn sent(&self, index: usize) -> Vec<Value> {
        self.links.lock().expect("mock lock")[index]
            .sent
            .iter()
            .map(|frame| serde_json::from_slice(frame).expect("client sent valid json"))
            .collect()
    }

    /// `cmd` of every frame sent on link `index`
    pub fn sent_cmds(&self, index: usize) -> Vec<String> {
        self.sent(index)
            .iter()
            .map(|frame| frame["cmd"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.links.lock().expect("mock lock")[index].closed
    }

    pub fn is_detached(&self, index: usize) -> bool {
        !self.links.lock().expect("mock lock")[index].events.is_attached()
    }
}

struct MockLink {
    links: Arc<Mutex<Vec<LinkRecord>>>,
    index: usize,
}

impl TransportLink for MockLink {
    fn send(&mut self, frame: Bytes) -> Result<()> {
        let mut links = self.links.lock().map_err(|_| anyhow!("mock poisoned"))?;
        let record = &mut links[self.index];
        if record.closed {
            return Err(anyhow!("link closed"));
        }
        record.sent.push(frame);
        Ok(())
    }

    fn detach(&mut self) {
        if let Ok(links) = self.links.lock() {
            links[self.index].events.detach();
        }
    }

    fn close(&mut self) {
        if let Ok(mut links) = self.links.lock() {
            links[self.index].closed = true;
        }
    }
}

impl TransportConnector for MockConnector {
    fn open(&self, uri: &str, events: EventSink) -> Box<dyn TransportLink> {
        let mut links = self.links.lock().expect("mock lock");
        links.push(LinkRecord {
            uri: uri.to_string(),
            events,
            sent: Vec::new(),
            closed: false,
        });
        Box::new(MockLink {
            links: self.links.clone(),
            index: links.len() - 1,
        })
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
