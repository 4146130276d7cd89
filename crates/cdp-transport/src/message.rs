//! CDP wire messages.
//!
//! Commands go out as `{"id", "method", "params"}`. The runtime answers with
//! `{"id", "result"}` or `{"id", "error"}` and pushes events as
//! `{"method", "params"}`.
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::Value;

use crate::error::TransportError;

/// Global command ID counter.
static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(1);

/// Generate the next unique command ID.
pub fn next_message_id() -> i64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// An incoming CDP message.
#[derive(Debug, Clone, PartialEq)]
pub enum CdpMessage {
    /// Answer to a command we sent.
    Response {
        /// The command ID this answers.
        id: i64,
        /// The result (if successful).
        result: Option<Value>,
        /// The error (if failed).
        error: Option<ProtocolError>,
    },
    /// Event pushed by the runtime.
    Event {
        /// Event name, e.g. `Debugger.paused`.
        method: String,
        /// Event payload.
        params: Value,
    },
}

/// The error object of a failed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// CDP error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
}

/// Serialize an outgoing command.
pub fn serialize_command(id: i64, method: &str, params: Value) -> String {
    serde_json::json!({
        "id": id,
        "method": method,
        "params": params
    })
    .to_string()
}

/// Parse one text frame into a [`CdpMessage`].
pub fn parse_message(text: &str) -> Result<CdpMessage, TransportError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TransportError::Serialization(format!("invalid JSON: {}", e)))?;

    if let Some(id) = value.get("id") {
        let id = id
            .as_i64()
            .ok_or_else(|| TransportError::InvalidMessage("id must be integer".into()))?;
        let error = value.get("error").map(|e| ProtocolError {
            code: e.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: e
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
        let result = value.get("result").cloned();
        return Ok(CdpMessage::Response { id, result, error });
    }

    match value.get("method").and_then(Value::as_str) {
        Some(method) => Ok(CdpMessage::Event {
            method: method.to_string(),
            params: value.get("params").cloned().unwrap_or(Value::Null),
        }),
        None => Err(TransportError::InvalidMessage(
            "message has neither id nor method".to_string(),
        )),
    }
}
