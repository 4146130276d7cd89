//! Plain-text rendering of debugger state for the console.
//!
//! Lines are shown one-based; the engine works in zero-based lines.

use cdp_debugger::{Breakpoint, EvaluationResult, LogMessage, PropertyDescriptor, ScopeEntry, StackFrame};

pub(crate) fn describe_ready(domains: &[String]) -> String {
    if domains.is_empty() {
        "debugger ready".to_string()
    } else {
        format!("debugger ready ({})", domains.join(", "))
    }
}

pub(crate) fn describe_log(message: &LogMessage) -> String {
    format!("[{}] {}", message.kind, message.text())
}

pub(crate) fn describe_breakpoint(breakpoint: &Breakpoint) -> String {
    let mut line = format!(
        "breakpoint {} at {}:{}",
        breakpoint.id,
        breakpoint.url,
        breakpoint.line_number + 1
    );
    if let Some(condition) = &breakpoint.condition {
        line.push_str(&format!(" if {}", condition));
    }
    line
}

pub(crate) fn describe_frame(index: usize, frame: &StackFrame) -> String {
    let name = if frame.name.is_empty() {
        "(anonymous)"
    } else {
        frame.name.as_str()
    };
    format!(
        "#{} {} at {}:{}:{}",
        index,
        name,
        frame.file_path,
        frame.line_number + 1,
        frame.column_number + 1
    )
}

pub(crate) fn describe_stack(stack: &[StackFrame]) -> String {
    if stack.is_empty() {
        return "no call stack (not paused)".to_string();
    }
    stack
        .iter()
        .enumerate()
        .map(|(i, frame)| describe_frame(i, frame))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn describe_paused(reason: &str, stack: &[StackFrame], hits: &[Breakpoint]) -> String {
    let mut out = match stack.first() {
        Some(top) => format!(
            "paused ({}) in {}",
            reason,
            describe_frame(0, top).trim_start_matches("#0 ")
        ),
        None => format!("paused ({})", reason),
    };
    for hit in hits {
        out.push_str("\n  hit ");
        out.push_str(&describe_breakpoint(hit));
    }
    out
}

pub(crate) fn describe_scope(entries: &[ScopeEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let mut line = format!("{}: {}", entry.name, entry.value.describe());
            if let Some(id) = &entry.value.object_id {
                line.push_str(&format!("  [{}]", id));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn describe_properties(properties: &[PropertyDescriptor]) -> String {
    if properties.is_empty() {
        return "(no properties)".to_string();
    }
    properties
        .iter()
        .map(|p| match &p.value {
            Some(value) => {
                let mut line = format!("{} = {}", p.name, value.describe());
                if let Some(id) = &value.object_id {
                    line.push_str(&format!("  [{}]", id));
                }
                line
            }
            None if p.get.is_some() || p.set.is_some() => format!("{} = (accessor)", p.name),
            None => format!("{} = undefined", p.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn describe_evaluation(result: &EvaluationResult) -> String {
    let mut out = result.describe();
    if let Some(id) = &result.result.object_id {
        out.push_str(&format!("  [{}]", id));
    }
    out
}
