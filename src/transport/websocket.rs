//! WebSocket transport implementation

use crate::transport::traits::{EventSink, TransportConnector, TransportEvent, TransportLink};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Requests from the link handle to its socket task
#[derive(Debug)]
enum LinkCommand {
    Frame(Bytes),
    Close,
}

/// Handle to a socket task
pub struct WebSocketLink {
    commands: mpsc::UnboundedSender<LinkCommand>,
    events: EventSink,
}

impl TransportLink for WebSocketLink {
    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.commands
            .send(LinkCommand::Frame(frame))
            .map_err(|_| anyhow!("WebSocket closed"))
    }

    fn detach(&mut self) {
        self.events.detach();
    }

    fn close(&mut self) {
        // The task may already be gone
        let _ = self.commands.send(LinkCommand::Close);
    }
}

/// Opens `ws://` (or `wss://` with the `tls` feature) connections
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Handshakes that take longer than `connect_timeout` are abandoned
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl TransportConnector for WebSocketConnector {
    fn open(&self, uri: &str, events: EventSink) -> Box<dyn TransportLink> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            uri.to_string(),
            self.connect_timeout,
            events.clone(),
            commands_rx,
        ));
        Box::new(WebSocketLink {
            commands: commands_tx,
            events,
        })
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

/// Drive one WebSocket until it closes
async fn run_socket(
    uri: String,
    connect_timeout: Duration,
    events: EventSink,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
) {
    let ws = match timeout(connect_timeout, connect_async(uri.as_str())).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            events.emit(TransportEvent::Error(format!("Connect to {} failed: {}", uri, e)));
            events.emit(TransportEvent::Close("connect failed".into()));
            return;
        }
        Err(_) => {
            events.emit(TransportEvent::Error(format!(
                "Connect to {} timed out after {}ms",
                uri,
                connect_timeout.as_millis()
            )));
            events.emit(TransportEvent::Close("connect timed out".into()));
            return;
        }
    };

    events.emit(TransportEvent::Open);
    let (mut writer, mut reader) = ws.split();

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Frame(frame)) => {
                    let message = match std::str::from_utf8(&frame) {
                        Ok(text) => Message::Text(text.to_owned().into()),
                        Err(_) => Message::Binary(frame),
                    };
                    if let Err(e) = writer.send(message).await {
                        events.emit(TransportEvent::Error(format!("Write error: {}", e)));
                        break "write failed".to_string();
                    }
                }
                Some(LinkCommand::Close) | None => {
                    let _ = writer.close().await;
                    break "closed by client".to_string();
                }
            },

            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(Bytes::copy_from_slice(text.as_bytes())));
                }
                Some(Ok(Message::Binary(data))) => {
                    events.emit(TransportEvent::Message(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| format!("closed by peer: {} {}", u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(|| "closed by peer".to_string());
                }
                Some(Ok(_)) => {
                    // Ping/pong frames are answered by tungstenite
                }
                Some(Err(e)) => {
                    events.emit(TransportEvent::Error(format!("Read error: {}", e)));
                    break "read failed".to_string();
                }
                None => break "stream ended".to_string(),
            },
        }
    };

    debug!("WebSocket {} closed: {}", uri, reason);
    events.emit(TransportEvent::Close(reason));
}
