//! cdp-transport: Chrome DevTools Protocol message channel.
//!
//! Wire messages, request/response dispatch, the [`Transport`] capability
//! consumed by the debug session, and a WebSocket implementation of it.
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod websocket;

pub use channel::{ChannelEvent, EventReceiver, Transport};
pub use error::TransportError;
pub use message::{CdpMessage, ProtocolError};
pub use websocket::WsTransport;
