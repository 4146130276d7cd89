//! Expression evaluation against the paused stack.

use cdp_transport::Transport;
use serde_json::json;

use crate::error::DebuggerError;
use crate::protocol::{from_params, CallFrame, EvaluationResult};

const EVALUATE_ON_CALL_FRAME: &str = "Debugger.evaluateOnCallFrame";

/// Evaluate `expression` in `frames`, innermost first.
///
/// A thrown error other than a `SyntaxError` moves on to the next outer
/// frame while frames remain. The first clean result is returned;
/// otherwise the last payload is surfaced as
/// [`DebuggerError::EvaluationFailed`]. Protocol errors stop the cascade.
pub async fn evaluate_on_frames(
    transport: &dyn Transport,
    frames: &[CallFrame],
    expression: &str,
) -> Result<EvaluationResult, DebuggerError> {
    if frames.is_empty() {
        return Err(DebuggerError::NoFrames);
    }

    for (index, frame) in frames.iter().enumerate() {
        let call_frame_id = frame
            .call_frame_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(DebuggerError::FrameWithoutId)?;

        let params = json!({
            "callFrameId": call_frame_id,
            "expression": expression,
            "generatePreview": false,
            "silent": true,
            "returnByValue": false,
            "includeCommandLineAPI": false,
        });
        let raw = transport.call(EVALUATE_ON_CALL_FRAME, params).await?;
        let outcome: EvaluationResult = from_params(EVALUATE_ON_CALL_FRAME, raw)?;

        let outer_frames_remain = index + 1 < frames.len();
        if outer_frames_remain && outcome.is_recoverable_error() {
            tracing::debug!(
                "{:?} failed in frame {}, trying the next outer frame",
                expression,
                index
            );
            continue;
        }
        if outcome.exception_details.is_none() {
            return Ok(outcome);
        }
        return Err(DebuggerError::EvaluationFailed(Box::new(outcome)));
    }

    Err(DebuggerError::NoFrames)
}
