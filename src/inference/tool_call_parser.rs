//! Tool call parsing: normalizes model output to `ToolCall` structs.
//!
//! Two formats are understood (per model `tool_call_format`):
//!
//! 1. **native_json**: OpenAI-style `tool_calls` in the response message,
//!    each with a function name and JSON-encoded arguments.
//!
//! 2. **pythonic**: text-based calls emitted in the message content:
//!    ```text
//!    Tool: get_user_stats
//!    Arguments: {"user_id": "sarah"}
//!    ```
//!
//! Slightly malformed argument JSON (trailing commas, missing closing
//! braces, stray control characters) is repaired. Anything beyond that is a
//! `ToolCallParseError`, which the agent treats as fatal malformed output.

use uuid::Uuid;

use super::errors::InferenceError;
use super::types::ToolCall;

// ─── Native JSON ─────────────────────────────────────────────────────────────

/// Build a `ToolCall` from a native tool call's name and raw argument string.
///
/// An empty or whitespace-only argument string is read as `{}`.
pub fn parse_native_tool_call(
    id: Option<&str>,
    name: &str,
    arguments_json: &str,
) -> Result<ToolCall, InferenceError> {
    if name.trim().is_empty() {
        return Err(InferenceError::ToolCallParseError {
            raw_response: arguments_json.to_string(),
            reason: "empty tool name".into(),
        });
    }

    let arguments = parse_arguments(arguments_json)?;

    Ok(ToolCall {
        id: id
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(new_call_id),
        name: name.trim().to_string(),
        arguments,
    })
}

// ─── Pythonic ────────────────────────────────────────────────────────────────

/// Extract every `Tool:` / `Arguments:` pair from free text.
///
/// A `Tool:` line is a call only when an `Arguments:` line follows it or it
/// names one of `offered_tools`; otherwise it is ordinary answer text. A
/// known tool without an `Arguments:` line gets `{}`.
pub fn parse_pythonic_tool_calls(
    text: &str,
    offered_tools: &[&str],
) -> Result<Vec<ToolCall>, InferenceError> {
    let mut calls = Vec::new();
    let mut lines = text.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        let Some(name) = strip_label(line, "tool:") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let arguments = match lines.peek().and_then(|next| strip_label(next, "arguments:")) {
            Some(raw) => {
                let value = parse_arguments(raw)?;
                lines.next();
                value
            }
            None if offered_tools.contains(&name) => {
                serde_json::Value::Object(serde_json::Map::new())
            }
            None => continue,
        };

        calls.push(ToolCall {
            id: new_call_id(),
            name: name.to_string(),
            arguments,
        });
    }

    Ok(calls)
}

/// Case-insensitive `label` prefix strip, returning the trimmed remainder.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

// ─── Argument JSON ───────────────────────────────────────────────────────────

/// Parse tool arguments, applying repairs when the raw text is not valid JSON.
///
/// Arguments must decode to a JSON object.
pub fn parse_arguments(raw: &str) -> Result<serde_json::Value, InferenceError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) => v,
        Err(e) => repair_arguments(raw).ok_or_else(|| InferenceError::ToolCallParseError {
            raw_response: raw.to_string(),
            reason: format!("invalid JSON arguments: {e}"),
        })?,
    };

    // Some runtimes double-encode: the arguments arrive as a JSON string
    // containing the object.
    let value = match value {
        serde_json::Value::String(inner) => {
            serde_json::from_str(&inner).map_err(|e| InferenceError::ToolCallParseError {
                raw_response: raw.to_string(),
                reason: format!("invalid double-encoded arguments: {e}"),
            })?
        }
        other => other,
    };

    if !value.is_object() {
        return Err(InferenceError::ToolCallParseError {
            raw_response: raw.to_string(),
            reason: "arguments must be a JSON object".into(),
        });
    }

    Ok(value)
}

/// Best-effort repair of model-generated argument JSON.
///
/// Returns `None` if the text is still invalid after all repairs.
pub fn repair_arguments(raw: &str) -> Option<serde_json::Value> {
    let cleaned: String = raw
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    let without_commas = strip_trailing_commas(&cleaned);
    let balanced = close_open_braces(&without_commas);

    [cleaned, without_commas, balanced]
        .iter()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

/// Drop commas that sit directly (modulo whitespace) before `}` or `]`.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }

    out
}

/// Append `}` for every brace left open outside of string literals.
fn close_open_braces(input: &str) -> String {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    let mut out = input.to_string();
    for _ in 0..depth.max(0) {
        out.push('}');
    }
    out
}

fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
