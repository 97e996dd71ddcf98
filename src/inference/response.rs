//! Chat-completion response parsing.
//!
//! Turns a non-streaming `/chat/completions` body into a [`ModelReply`]:
//! the assistant text plus any tool calls, whether they arrived as native
//! `tool_calls` or embedded in the text (pythonic format).

use serde::Deserialize;

use super::config::ToolCallFormat;
use super::errors::InferenceError;
use super::tool_call_parser::{parse_native_tool_call, parse_pythonic_tool_calls};
use super::types::{ModelReply, ToolDefinition};

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<CompletionToolCall>>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: Option<String>,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Parse a non-streaming response body.
///
/// `offered_tools` are the tools sent with the request; text-embedded calls
/// are only looked for when there were any.
pub fn parse_completion_response(
    body: &str,
    format: ToolCallFormat,
    offered_tools: &[ToolDefinition],
) -> Result<ModelReply, InferenceError> {
    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::MalformedResponse {
            reason: "empty choices array".into(),
        })?;

    let content = choice.message.content.filter(|c| !c.trim().is_empty());

    let mut tool_calls = Vec::new();
    for tc in choice.message.tool_calls.unwrap_or_default() {
        tool_calls.push(parse_native_tool_call(
            tc.id.as_deref(),
            &tc.function.name,
            &tc.function.arguments,
        )?);
    }

    if tool_calls.is_empty() && format == ToolCallFormat::Pythonic && !offered_tools.is_empty() {
        if let Some(text) = content.as_deref() {
            let names: Vec<&str> = offered_tools.iter().map(|t| t.function.name.as_str()).collect();
            tool_calls = parse_pythonic_tool_calls(text, &names)?;
        }
    }

    let finish_reason = if tool_calls.is_empty() {
        choice.finish_reason
    } else {
        Some("tool_calls".into())
    };

    Ok(ModelReply {
        text: content,
        tool_calls,
        finish_reason,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
