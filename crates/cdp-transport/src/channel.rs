//! The message-channel capability the debug session is written against.
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Something the runtime pushed to us.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A CDP event.
    Notification {
        /// Event name, e.g. `Debugger.scriptParsed`.
        method: String,
        /// Event payload.
        params: Value,
    },
    /// The channel closed. Sent once, always last.
    Closed,
}

/// Ordered stream of [`ChannelEvent`]s belonging to one channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

/// A bidirectional CDP channel.
///
/// `call` suspends until the matching response arrives. Events are
/// delivered separately through the [`EventReceiver`] handed out when the
/// channel is created.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one command and wait for its result.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Close the channel. Pending and later calls fail with
    /// [`TransportError::Closed`].
    async fn close(&self);
}
