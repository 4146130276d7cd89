//! Command/response dispatcher.
//!
//! Tracks in-flight commands by ID, hands responses to waiting callers
//! via oneshot channels and passes events through to the caller.
use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::channel::ChannelEvent;
use crate::message::{CdpMessage, ProtocolError};

/// The outcome delivered to a waiting command.
#[derive(Debug)]
pub enum DispatchResult {
    /// Successful response with the result value.
    Success(serde_json::Value),
    /// Error response from the runtime.
    Error(ProtocolError),
}

/// Manages pending commands and routes responses.
#[derive(Default)]
pub struct Dispatcher {
    pending: HashMap<i64, oneshot::Sender<DispatchResult>>,
}

impl Dispatcher {
    /// Create a new dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending command and return a receiver for the response.
    pub fn register_request(&mut self, id: i64) -> oneshot::Receiver<DispatchResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        rx
    }

    /// How many commands are awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Route an incoming message.
    ///
    /// Responses complete the matching pending command and yield `None`.
    /// Events are returned for the caller to forward.
    pub fn dispatch(&mut self, message: CdpMessage) -> Option<ChannelEvent> {
        match message {
            CdpMessage::Response { id, result, error } => {
                if let Some(sender) = self.pending.remove(&id) {
                    let outcome = match error {
                        Some(err) => DispatchResult::Error(err),
                        None => DispatchResult::Success(result.unwrap_or(serde_json::Value::Null)),
                    };
                    // The caller may have timed out and dropped the receiver.
                    let _ = sender.send(outcome);
                } else {
                    tracing::warn!("received response for unknown command id: {}", id);
                }
                None
            }
            CdpMessage::Event { method, params } => {
                tracing::trace!("event: {}", method);
                Some(ChannelEvent::Notification { method, params })
            }
        }
    }

    /// Forget a single pending command. Returns true if it was found.
    pub fn cancel(&mut self, id: i64) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Drop every pending command; their callers observe a closed channel.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }
}
