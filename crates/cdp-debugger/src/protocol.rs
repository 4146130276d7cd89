//! CDP payload types.
//!
//! Only the parts of the `Runtime` and `Debugger` domains the session reads
//! are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DebuggerError;

// ---------------------------------------------------------------------------
// Runtime domain
// ---------------------------------------------------------------------------

/// Mirror of a JavaScript value held by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// `object`, `function`, `string`, `number`, ...
    #[serde(rename = "type", default)]
    pub object_type: String,
    /// `error`, `array`, `null`, ... for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Constructor name for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Primitive value or JSON-serialisable object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// `NaN`, `-0`, `Infinity` and bigints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    /// String representation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Handle for follow-up `Runtime.getProperties` calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl RemoteObject {
    /// A plain string value, used for synthesized log arguments.
    pub fn string(text: impl Into<String>) -> Self {
        Self {
            object_type: "string".to_string(),
            value: Some(Value::String(text.into())),
            ..Self::default()
        }
    }

    /// Best-effort one-line rendering.
    pub fn describe(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        if let Some(raw) = &self.unserializable_value {
            return raw.clone();
        }
        match &self.value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.object_type.clone(),
        }
    }
}

/// Details of a thrown exception.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Runtime-assigned id.
    #[serde(default)]
    pub exception_id: i64,
    /// Short message, usually `Uncaught`.
    #[serde(default)]
    pub text: String,
    /// Zero-based line of the throw site.
    #[serde(default)]
    pub line_number: u32,
    /// Zero-based column of the throw site.
    #[serde(default)]
    pub column_number: u32,
    /// Script of the throw site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    /// URL of the throw site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The thrown value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// The thrown value's description, or the summary text.
    pub fn description(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Result of `Debugger.evaluateOnCallFrame`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// The value, or the thrown value when `exception_details` is set.
    pub result: RemoteObject,
    /// Present when the expression threw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

impl EvaluationResult {
    /// Whether the result is a thrown error other than a `SyntaxError`,
    /// i.e. one an enclosing frame might not raise.
    pub fn is_recoverable_error(&self) -> bool {
        self.result.subtype.as_deref() == Some("error")
            && self.result.class_name.as_deref() != Some("SyntaxError")
    }

    /// Human readable summary for error reporting.
    pub fn describe(&self) -> String {
        match &self.exception_details {
            Some(details) if self.result.description.is_none() => details.description(),
            _ => self.result.describe(),
        }
    }
}

/// One entry of `Runtime.getProperties`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Value, absent for accessors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub configurable: bool,
    #[serde(default)]
    pub enumerable: bool,
    #[serde(default)]
    pub is_own: bool,
    /// Getter function, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<RemoteObject>,
    /// Setter function, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<RemoteObject>,
}

// ---------------------------------------------------------------------------
// Debugger domain
// ---------------------------------------------------------------------------

/// A position inside a runtime script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    /// Zero-based.
    pub line_number: u32,
    /// Zero-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

/// One scope of a call frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// `global`, `local`, `closure`, `block`, ...
    #[serde(rename = "type")]
    pub scope_type: String,
    /// Object whose properties are the scope's variables.
    pub object: RemoteObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One activation record of the paused stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Id used by `Debugger.evaluateOnCallFrame`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_frame_id: Option<String>,
    #[serde(default)]
    pub function_name: String,
    pub location: Location,
    /// Script URL as reported by the runtime.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
    /// The frame's `this` binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<RemoteObject>,
}

/// `Debugger.paused` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    /// Innermost first.
    pub call_frames: Vec<CallFrame>,
    /// `breakpoint`, `exception`, `other`, ...
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Ids of the breakpoints that caused the pause.
    #[serde(default)]
    pub hit_breakpoints: Vec<String>,
}

/// `Debugger.scriptParsed` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
    /// Runtimes send an empty string when there is no map.
    #[serde(rename = "sourceMapURL", default, skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
}

impl ScriptParsedEvent {
    /// The source map reference, treating `""` as absent.
    pub fn source_map_reference(&self) -> Option<&str> {
        self.source_map_url.as_deref().filter(|s| !s.is_empty())
    }
}

/// `Runtime.consoleAPICalled` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalledEvent {
    /// `log`, `warning`, `error`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<RemoteObject>,
}

/// `Runtime.exceptionThrown` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrownEvent {
    #[serde(default)]
    pub timestamp: f64,
    pub exception_details: ExceptionDetails,
}

// ---------------------------------------------------------------------------
// Event decoding
// ---------------------------------------------------------------------------

/// A runtime event the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    ExceptionThrown(ExceptionThrownEvent),
    ConsoleApiCalled(ConsoleApiCalledEvent),
    Paused(PausedEvent),
    Resumed,
    ScriptParsed(ScriptParsedEvent),
    /// Any event the session does not consume.
    Other(String),
}

impl RemoteEvent {
    /// Decode an event by its CDP method name.
    pub fn decode(method: &str, params: Value) -> Result<Self, DebuggerError> {
        let event = match method {
            "Runtime.exceptionThrown" => Self::ExceptionThrown(from_params(method, params)?),
            "Runtime.consoleAPICalled" => Self::ConsoleApiCalled(from_params(method, params)?),
            "Debugger.paused" => Self::Paused(from_params(method, params)?),
            "Debugger.resumed" => Self::Resumed,
            "Debugger.scriptParsed" => Self::ScriptParsed(from_params(method, params)?),
            other => Self::Other(other.to_string()),
        };
        Ok(event)
    }
}

/// Deserialize a command result or event payload, tagging failures with
/// the method name.
pub fn from_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Value,
) -> Result<T, DebuggerError> {
    serde_json::from_value(params).map_err(|e| DebuggerError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_paused_event() {
        let params = json!({
            "reason": "other",
            "hitBreakpoints": ["1:12:0:file:///app/app.js"],
            "callFrames": [{
                "callFrameId": "frame-0",
                "functionName": "main",
                "location": {"scriptId": "42", "lineNumber": 12, "columnNumber": 4},
                "url": "file:///app/app.js",
                "scopeChain": [
                    {"type": "local", "object": {"type": "object", "objectId": "scope-0"}}
                ],
                "this": {"type": "undefined"}
            }]
        });
        let event = RemoteEvent::decode("Debugger.paused", params).unwrap();
        let RemoteEvent::Paused(paused) = event else {
            panic!("expected paused event");
        };
        assert_eq!(paused.hit_breakpoints.len(), 1);
        let frame = &paused.call_frames[0];
        assert_eq!(frame.call_frame_id.as_deref(), Some("frame-0"));
        assert_eq!(frame.location.script_id, "42");
        assert_eq!(frame.location.column_number, Some(4));
        assert_eq!(frame.scope_chain[0].scope_type, "local");
        assert_eq!(frame.this.as_ref().unwrap().object_type, "undefined");
    }

    #[test]
    fn decode_script_parsed_with_empty_map_url() {
        let params = json!({"scriptId": "7", "url": "file:///app/lib.js", "sourceMapURL": ""});
        let RemoteEvent::ScriptParsed(parsed) =
            RemoteEvent::decode("Debugger.scriptParsed", params).unwrap()
        else {
            panic!("expected scriptParsed");
        };
        assert_eq!(parsed.source_map_reference(), None);
    }

    #[test]
    fn decode_script_parsed_with_map_url() {
        let params = json!({"scriptId": "8", "url": "file:///app/app.js", "sourceMapURL": "app.js.map"});
        let RemoteEvent::ScriptParsed(parsed) =
            RemoteEvent::decode("Debugger.scriptParsed", params).unwrap()
        else {
            panic!("expected scriptParsed");
        };
        assert_eq!(parsed.source_map_reference(), Some("app.js.map"));
    }

    #[test]
    fn decode_unknown_event_is_other() {
        let event = RemoteEvent::decode("Runtime.executionContextCreated", json!({})).unwrap();
        assert_eq!(
            event,
            RemoteEvent::Other("Runtime.executionContextCreated".into())
        );
    }

    #[test]
    fn decode_malformed_payload_fails() {
        let err = RemoteEvent::decode("Debugger.paused", json!({"callFrames": 3})).unwrap_err();
        assert!(matches!(err, DebuggerError::InvalidResponse { .. }));
    }

    #[test]
    fn exception_description_prefers_thrown_value() {
        let details = ExceptionDetails {
            text: "Uncaught".into(),
            exception: Some(RemoteObject {
                description: Some("TypeError: x is not a function".into()),
                ..RemoteObject::default()
            }),
            ..ExceptionDetails::default()
        };
        assert_eq!(details.description(), "TypeError: x is not a function");

        let bare = ExceptionDetails {
            text: "Uncaught".into(),
            ..ExceptionDetails::default()
        };
        assert_eq!(bare.description(), "Uncaught");
    }

    #[test]
    fn recoverable_error_excludes_syntax_errors() {
        let mut result = EvaluationResult {
            result: RemoteObject {
                object_type: "object".into(),
                subtype: Some("error".into()),
                class_name: Some("ReferenceError".into()),
                ..RemoteObject::default()
            },
            exception_details: None,
        };
        assert!(result.is_recoverable_error());
        result.result.class_name = Some("SyntaxError".into());
        assert!(!result.is_recoverable_error());
        result.result.subtype = None;
        result.result.class_name = None;
        assert!(!result.is_recoverable_error());
    }

    #[test]
    fn remote_object_describe() {
        assert_eq!(RemoteObject::string("hi").describe(), "hi");
        let number = RemoteObject {
            object_type: "number".into(),
            value: Some(json!(42)),
            ..RemoteObject::default()
        };
        assert_eq!(number.describe(), "42");
        let nan = RemoteObject {
            object_type: "number".into(),
            unserializable_value: Some("NaN".into()),
            ..RemoteObject::default()
        };
        assert_eq!(nan.describe(), "NaN");
    }
}
