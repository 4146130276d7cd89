//! Transport error types.
/// Errors from the CDP message channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Address that was dialled.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The channel is closed; no further commands can be sent.
    #[error("channel closed")]
    Closed,

    /// No response arrived in time.
    #[error("command {method} timed out after {secs} seconds")]
    Timeout {
        /// Command that timed out.
        method: String,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// The remote runtime answered with an error object.
    #[error("protocol error {code}: {message}")]
    Protocol {
        /// CDP error code.
        code: i64,
        /// CDP error message.
        message: String,
    },

    /// Malformed JSON on the wire.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Well-formed JSON that is not a CDP message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
