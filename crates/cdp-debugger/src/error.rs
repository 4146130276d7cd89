//! Debugger error types.
use cdp_transport::TransportError;

use crate::protocol::EvaluationResult;

/// Why a source map could not be turned into a position mapper.
#[derive(Debug, thiserror::Error)]
pub enum SourceMapError {
    /// The document is not valid source map JSON.
    #[error("invalid source map JSON: {0}")]
    Json(String),

    /// Only revision 3 maps are understood.
    #[error("unsupported source map version {0}")]
    UnsupportedVersion(u64),

    /// Index maps (`sections`) are not supported.
    #[error("index source maps are not supported")]
    IndexMap,

    /// A `mappings` segment failed to decode.
    #[error("invalid VLQ segment {segment:?}: {reason}")]
    Vlq {
        /// The offending segment.
        segment: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An inline `data:` reference could not be decoded.
    #[error("invalid data URL: {0}")]
    DataUrl(String),

    /// The map file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// File that was tried.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// The map could not be fetched over HTTP.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// URL that was tried.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// Resolution took longer than the configured bound.
    #[error("source map resolution timed out after {0} ms")]
    Timeout(u64),

    /// Neither a file path nor a fetchable URL could be derived.
    #[error("cannot resolve source map {reference:?} for script {script:?}")]
    Unresolvable {
        /// The `sourceMapURL` of the script.
        reference: String,
        /// The script URL it is relative to.
        script: String,
    },
}

/// Errors from debug session operations.
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    /// The session is not connected.
    #[error("not connected")]
    NotConnected,

    /// `evaluate` was called with an empty call stack.
    #[error("there are no frames to evaluate")]
    NoFrames,

    /// A call frame arrived without a `callFrameId`.
    #[error("frame has no id")]
    FrameWithoutId,

    /// No frame at the requested index.
    #[error("no call frame at index {0}")]
    NoSuchFrame(usize),

    /// Every frame was tried and the expression still threw.
    #[error("evaluation failed: {}", .0.describe())]
    EvaluationFailed(Box<EvaluationResult>),

    /// An original position has no generated counterpart.
    #[error("no generated position for {url}:{line}")]
    Unmapped {
        /// Original source URL.
        url: String,
        /// Zero-based line.
        line: u32,
    },

    /// The session went away before a pending breakpoint was placed.
    #[error("breakpoint placement cancelled")]
    BreakpointCancelled,

    /// The runtime answered with something we could not decode.
    #[error("invalid response to {method}: {reason}")]
    InvalidResponse {
        /// Command that was sent.
        method: String,
        /// Decode failure.
        reason: String,
    },

    /// Channel failure or protocol error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExceptionDetails, RemoteObject};

    #[test]
    fn source_map_error_display() {
        assert_eq!(
            SourceMapError::UnsupportedVersion(2).to_string(),
            "unsupported source map version 2"
        );
        assert_eq!(
            SourceMapError::IndexMap.to_string(),
            "index source maps are not supported"
        );
        assert_eq!(
            SourceMapError::Timeout(5000).to_string(),
            "source map resolution timed out after 5000 ms"
        );
        let err = SourceMapError::Read {
            path: "/app/app.js.map".into(),
            reason: "No such file or directory".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read /app/app.js.map: No such file or directory"
        );
    }

    #[test]
    fn debugger_error_display() {
        assert_eq!(DebuggerError::NotConnected.to_string(), "not connected");
        assert_eq!(
            DebuggerError::NoFrames.to_string(),
            "there are no frames to evaluate"
        );
        assert_eq!(DebuggerError::FrameWithoutId.to_string(), "frame has no id");
        assert_eq!(
            DebuggerError::NoSuchFrame(3).to_string(),
            "no call frame at index 3"
        );
        assert_eq!(
            DebuggerError::Unmapped {
                url: "app.ts".into(),
                line: 9
            }
            .to_string(),
            "no generated position for app.ts:9"
        );
    }

    #[test]
    fn evaluation_failed_uses_exception_description() {
        let payload = EvaluationResult {
            result: RemoteObject {
                object_type: "object".into(),
                subtype: Some("error".into()),
                class_name: Some("ReferenceError".into()),
                description: Some("ReferenceError: nope is not defined".into()),
                ..RemoteObject::default()
            },
            exception_details: Some(ExceptionDetails {
                text: "Uncaught".into(),
                ..ExceptionDetails::default()
            }),
        };
        let err = DebuggerError::EvaluationFailed(Box::new(payload));
        assert_eq!(
            err.to_string(),
            "evaluation failed: ReferenceError: nope is not defined"
        );
    }

    #[test]
    fn transport_error_is_transparent() {
        let err: DebuggerError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "channel closed");
    }
}
