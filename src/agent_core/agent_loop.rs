//! Bounded tool-calling agent loop.
//!
//! Each iteration makes one model call with the three user-data tools
//! attached. Tool calls are executed and their results appended as tool
//! messages; a reply with text and no tool calls ends the loop. The loop
//! stops with `NonConvergence` after `max_iterations` model calls.

use std::sync::Arc;

use super::errors::AgentError;
use super::tokens::{estimate_messages_tokens, truncate_chars};
use super::types::{ConversationState, RoutingDecision, ToolInvocationRecord, ToolResult};
use crate::config::AgentConfig;
use crate::inference::model::LanguageModel;
use crate::inference::types::{ChatMessage, Role, ToolCall};
use crate::tools::ToolAdapters;

/// Context recorded for answers built from tool results.
pub const EXTERNAL_CONTEXT_MARKER: &str = "External service data";

pub const AGENT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant with access to a user directory. Use the tools to answer \
questions about users:
- get_user_profile: name, email, location, join date, bio, website and company
- get_user_stats: posts, followers, following, engagement rate, likes and comments
- get_recent_activity: the user's most recent activity, newest first

Pass user names or ids to the tools exactly as the user wrote them (e.g. \"ana\" or \
\"user_001\"). If a tool reports that a user was not found, say so in your answer. \
Answer in plain sentences once you have the data you need.";

/// Output of one loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub answer: String,
    pub context: String,
    pub tool_records: Vec<ToolInvocationRecord>,
    /// Model calls made, nudges included.
    pub iterations: usize,
}

pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    tools: ToolAdapters,
    max_iterations: usize,
    max_tool_result_chars: usize,
    max_empty_retries: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolAdapters, config: &AgentConfig) -> Self {
        Self {
            model,
            tools,
            max_iterations: config.max_iterations.max(1),
            max_tool_result_chars: config.max_tool_result_chars,
            max_empty_retries: config.max_empty_retries,
        }
    }

    pub async fn run(&self, state: &ConversationState) -> Result<AgentOutcome, AgentError> {
        let definitions = self.tools.definitions();
        let mut messages = vec![ChatMessage::system(AGENT_SYSTEM_PROMPT)];
        messages.extend(seed_messages(state));

        let mut records: Vec<ToolInvocationRecord> = Vec::new();
        let mut empty_replies = 0usize;

        for iteration in 1..=self.max_iterations {
            tracing::debug!(
                iteration,
                messages = messages.len(),
                prompt_tokens = estimate_messages_tokens(&messages),
                "calling model"
            );
            let reply = self.model.generate(&messages, &definitions).await?;

            if reply.has_tool_calls() {
                tracing::debug!(
                    iteration,
                    calls = reply.tool_calls.len(),
                    finish_reason = reply.finish_reason.as_deref().unwrap_or("none"),
                    "model requested tool calls"
                );
                messages.push(ChatMessage::assistant_tool_calls(
                    reply.text.clone(),
                    &reply.tool_calls,
                ));
                for call in &reply.tool_calls {
                    let record = self.invoke(call, records.len() + 1)?;
                    let content = self.tool_message_content(&record)?;
                    messages.push(ChatMessage::tool_result(call.id.clone(), content));
                    records.push(record);
                }
                empty_replies = 0;
                continue;
            }

            let text = reply.trimmed_text();
            if !text.is_empty() {
                tracing::info!(
                    model = %self.model.name(),
                    iterations = iteration,
                    tool_calls = records.len(),
                    finish_reason = reply.finish_reason.as_deref().unwrap_or("none"),
                    "agent loop converged"
                );
                return Ok(AgentOutcome {
                    answer: text.to_string(),
                    context: EXTERNAL_CONTEXT_MARKER.to_string(),
                    tool_records: records,
                    iterations: iteration,
                });
            }

            if empty_replies >= self.max_empty_retries {
                tracing::warn!(iteration, "max empty retries reached");
                return Err(AgentError::EmptyAnswer {
                    route: RoutingDecision::Tools,
                });
            }
            empty_replies += 1;
            tracing::warn!(
                iteration,
                empty_replies,
                max_retries = self.max_empty_retries,
                "model returned empty response (0 text, 0 tools)"
            );
            messages.push(ChatMessage::user(empty_reply_nudge(records.len())));
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            tool_calls = records.len(),
            "agent loop did not converge"
        );
        Err(AgentError::NonConvergence {
            iterations: self.max_iterations,
        })
    }

    /// Execute one call. Unknown tools and bad arguments become error records.
    fn invoke(&self, call: &ToolCall, sequence: usize) -> Result<ToolInvocationRecord, AgentError> {
        let result = match self.tools.execute(&call.name, &call.arguments) {
            Ok(output) => {
                let value =
                    serde_json::to_value(&output).map_err(|e| AgentError::ToolExecution {
                        tool: call.name.clone(),
                        reason: e.to_string(),
                    })?;
                if output.is_not_found() {
                    ToolResult::NotFound(value)
                } else {
                    ToolResult::Found(value)
                }
            }
            Err(e) => ToolResult::Error(e.to_string()),
        };

        tracing::info!(
            tool = %call.name,
            sequence,
            status = result.status(),
            "tool invoked"
        );

        Ok(ToolInvocationRecord {
            sequence,
            tool: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        })
    }

    /// Serialized tool-result message body, truncated to the configured limit.
    fn tool_message_content(&self, record: &ToolInvocationRecord) -> Result<String, AgentError> {
        let body = match &record.result {
            ToolResult::Found(value) | ToolResult::NotFound(value) => serde_json::to_string(value)?,
            ToolResult::Error(message) => serde_json::json!({ "error": message }).to_string(),
        };
        Ok(truncate_tool_result(&body, &record.tool, self.max_tool_result_chars))
    }
}

/// History as messages, then the current input unless the history already
/// ends with that exact user message.
pub fn seed_messages(state: &ConversationState) -> Vec<ChatMessage> {
    let mut messages = state.history_messages();
    let ends_with_input = messages
        .last()
        .is_some_and(|m| m.role == Role::User && m.text_content() == state.input);
    if !ends_with_input {
        messages.push(ChatMessage::user(state.input.clone()));
    }
    messages
}

fn empty_reply_nudge(tool_calls_so_far: usize) -> String {
    if tool_calls_so_far == 0 {
        "You returned an empty response. Please answer the user's question \
         or call the appropriate tool now."
            .to_string()
    } else {
        format!(
            "You returned an empty response after processing {tool_calls_so_far} tool call(s). \
             Answer the user's question using the tool results above."
        )
    }
}

/// Keep the first `max_chars` characters of an oversized result and append a
/// truncation notice.
fn truncate_tool_result(result: &str, tool_name: &str, max_chars: usize) -> String {
    let total_chars = result.chars().count();
    if total_chars <= max_chars {
        return result.to_string();
    }

    let truncated = truncate_chars(result, max_chars);
    tracing::warn!(
        tool = %tool_name,
        original_chars = total_chars,
        truncated_to = max_chars,
        "tool result truncated"
    );
    format!("{truncated}\n\n[... truncated: showing first {max_chars} of {total_chars} chars]")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
