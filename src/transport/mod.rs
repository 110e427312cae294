pub mod traits;
pub mod websocket;

#[cfg(test)]
pub mod mock;

pub use traits::{EventSink, TransportConnector, TransportEnvelope, TransportEvent, TransportLink};
pub use websocket::{WebSocketConnector, WebSocketLink};
