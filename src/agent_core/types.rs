//! Shared types for the agent core.
//!
//! Sessions and their turns, the per-turn conversation state, routing
//! decisions and the records a turn produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::types::ChatMessage;

pub use crate::retrieval::RetrievedDocument;

// ─── Turns ──────────────────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

/// One entry of chat history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            TurnRole::User => ChatMessage::user(self.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

// ─── Sessions ───────────────────────────────────────────────────────────────

/// Persisted multi-turn state for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Chat history in causal order.
    pub history: Vec<Turn>,
    /// One context entry per completed turn, append-only.
    pub context_log: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: Vec::new(),
            context_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a completed turn: the user input, the answer and its context.
    pub fn record_turn(&mut self, input: &str, answer: &str, context: &str) {
        self.history.push(Turn::user(input));
        self.history.push(Turn::assistant(answer));
        self.context_log.push(context.to_string());
        self.updated_at = Utc::now();
    }

    /// Number of completed turns.
    pub fn turn_count(&self) -> usize {
        self.context_log.len()
    }
}

// ─── Conversation State ─────────────────────────────────────────────────────

/// The unit passed through one turn's processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub input: String,
    pub chat_history: Vec<Turn>,
    pub context: String,
    pub answer: String,
}

impl ConversationState {
    pub fn new(input: impl Into<String>, chat_history: Vec<Turn>) -> Self {
        Self {
            input: input.into(),
            chat_history,
            context: String::new(),
            answer: String::new(),
        }
    }

    /// History as role-tagged model messages.
    pub fn history_messages(&self) -> Vec<ChatMessage> {
        self.chat_history.iter().map(Turn::to_chat_message).collect()
    }
}

// ─── Routing ────────────────────────────────────────────────────────────────

/// Which pipeline handles a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingDecision {
    Rag,
    Tools,
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingDecision::Rag => f.write_str("rag"),
            RoutingDecision::Tools => f.write_str("tools"),
        }
    }
}

// ─── Tool Invocations ───────────────────────────────────────────────────────

/// What a tool call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolResult {
    Found(serde_json::Value),
    NotFound(serde_json::Value),
    /// Unknown tool or invalid arguments; the message was fed back to the model.
    Error(String),
}

impl ToolResult {
    pub fn status(&self) -> &'static str {
        match self {
            ToolResult::Found(_) => "found",
            ToolResult::NotFound(_) => "not_found",
            ToolResult::Error(_) => "error",
        }
    }
}

/// One tool call made during an agent loop run. `sequence` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub sequence: usize,
    pub tool: String,
    pub arguments: serde_json::Value,
    pub result: ToolResult,
}

// ─── Turn Result ────────────────────────────────────────────────────────────

/// Everything a completed turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub route: RoutingDecision,
    pub answer: String,
    pub context: String,
    /// RAG path only.
    pub standalone_question: Option<String>,
    /// RAG path only.
    pub documents: Vec<RetrievedDocument>,
    /// Tools path only.
    pub tool_records: Vec<ToolInvocationRecord>,
    /// Model invocations made by the agent loop (tools path only).
    pub iterations: usize,
    /// Retrieval failed or returned nothing; the answer had no context.
    pub degraded: bool,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
