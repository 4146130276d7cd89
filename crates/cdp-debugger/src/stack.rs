//! Host-facing views of the paused stack.

use serde::Serialize;

use crate::protocol::{CallFrame, RemoteObject};
use crate::script::ScriptRegistry;

/// One scope of a frame, as shown to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeEntry {
    /// Scope type: `this`, `local`, `closure`, `global`, ...
    pub name: String,
    pub value: RemoteObject,
}

/// One frame of the translated call stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub name: String,
    pub file_path: String,
    /// Zero-based.
    pub line_number: u32,
    pub column_number: u32,
    /// Filled for the innermost surviving frame only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<ScopeEntry>>,
}

/// The frame's scope chain with a synthetic `this` scope in front when the
/// frame has a `this` binding.
pub fn scope_of(frame: &CallFrame) -> Vec<ScopeEntry> {
    let this = frame.this.iter().map(|value| ScopeEntry {
        name: "this".to_string(),
        value: value.clone(),
    });
    let chain = frame.scope_chain.iter().map(|scope| ScopeEntry {
        name: scope.scope_type.clone(),
        value: scope.object.clone(),
    });
    this.chain(chain).collect()
}

/// Translate `frames` to original coordinates.
///
/// Frames in mapped scripts with no original position are dropped. Frames
/// in unknown scripts keep the URL the runtime reported.
pub fn call_stack(frames: &[CallFrame], scripts: &ScriptRegistry) -> Vec<StackFrame> {
    let mut stack = Vec::with_capacity(frames.len());
    for frame in frames {
        let line = frame.location.line_number;
        let column = frame.location.column_number.unwrap_or(0);
        let (file_path, line_number, column_number) = match scripts.by_id(&frame.location.script_id)
        {
            Some(script) => match script.original_position(line, column) {
                Some(position) => (
                    position.url,
                    position.line_number,
                    position.column_number.unwrap_or(column),
                ),
                None => {
                    tracing::trace!("dropping unmapped frame {}", frame.function_name);
                    continue;
                }
            },
            None => (frame.url.clone(), line, column),
        };
        let scope = stack.is_empty().then(|| scope_of(frame));
        stack.push(StackFrame {
            name: frame.function_name.clone(),
            file_path,
            line_number,
            column_number,
            scope,
        });
    }
    stack
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol::{Location, Scope};
    use crate::script::Script;
    use crate::source_map::PositionMapper;

    fn frame(name: &str, script_id: &str, line: u32) -> CallFrame {
        CallFrame {
            call_frame_id: Some(format!("{}-id", name)),
            function_name: name.into(),
            location: Location {
                script_id: script_id.into(),
                line_number: line,
                column_number: Some(0),
            },
            url: format!("file:///runtime/{}.js", script_id),
            scope_chain: vec![Scope {
                scope_type: "local".into(),
                object: RemoteObject {
                    object_type: "object".into(),
                    object_id: Some(format!("{}-local", name)),
                    ..RemoteObject::default()
                },
                name: None,
            }],
            this: None,
        }
    }

    fn registry() -> ScriptRegistry {
        let map = r#"{"version":3,"sources":["app.ts"],"mappings":";;AAAA;AACA;AACA"}"#;
        let mapper = Arc::new(PositionMapper::parse(map).unwrap());
        let mut registry = ScriptRegistry::new();
        registry.register(Script::generated("10", "file:///app/app.js", None).with_mapper(mapper));
        registry.register(Script::generated("11", "file:///app/lib.js", None));
        registry
    }

    #[test]
    fn scope_prepends_this() {
        let mut f = frame("main", "10", 2);
        assert_eq!(scope_of(&f).len(), 1);

        f.this = Some(RemoteObject {
            object_type: "object".into(),
            class_name: Some("Server".into()),
            ..RemoteObject::default()
        });
        let scope = scope_of(&f);
        assert_eq!(scope.len(), 2);
        assert_eq!(scope[0].name, "this");
        assert_eq!(scope[0].value.class_name.as_deref(), Some("Server"));
        assert_eq!(scope[1].name, "local");
    }

    #[test]
    fn mapped_frames_are_translated() {
        let stack = call_stack(&[frame("handler", "10", 3)], &registry());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].file_path, "file:///app/app.ts");
        assert_eq!(stack[0].line_number, 1);
    }

    #[test]
    fn unmapped_frames_are_dropped() {
        let frames = [frame("prologue", "10", 0), frame("outer", "11", 7)];
        let stack = call_stack(&frames, &registry());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].name, "outer");
        assert_eq!(stack[0].file_path, "file:///app/lib.js");
        assert_eq!(stack[0].line_number, 7);
    }

    #[test]
    fn unknown_script_keeps_runtime_url() {
        let stack = call_stack(&[frame("native", "99", 4)], &registry());
        assert_eq!(stack[0].file_path, "file:///runtime/99.js");
        assert_eq!(stack[0].line_number, 4);
    }

    #[test]
    fn only_first_frame_carries_scope() {
        let frames = [frame("inner", "11", 1), frame("outer", "11", 5)];
        let stack = call_stack(&frames, &registry());
        assert_eq!(stack.len(), 2);
        let scope = stack[0].scope.as_ref().unwrap();
        assert_eq!(scope[0].value.object_id.as_deref(), Some("inner-local"));
        assert!(stack[1].scope.is_none());
    }
}
