//! Agent Core: routing, retrieval, the tool-calling loop and session state.
//!
//! Submodules:
//! - `router`: keyword/entity query router (RAG vs tools)
//! - `rag_pipeline`: reformulate-then-retrieve answer pipeline
//! - `agent_loop`: bounded tool-calling loop over the user-data tools
//! - `orchestrator`: per-turn lifecycle with per-session locking
//! - `session_store`: session persistence trait + in-memory store
//! - `database`: SQLite session store
//! - `tokens`: token estimation for context budgets
//! - `types`: shared types across the agent core
//! - `errors`: agent-level error types

pub mod agent_loop;
pub mod database;
pub mod errors;
pub mod orchestrator;
pub mod rag_pipeline;
pub mod router;
pub mod session_store;
pub mod tokens;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use agent_loop::{AgentLoop, AgentOutcome};
pub use database::SqliteSessionStore;
pub use errors::AgentError;
pub use orchestrator::Orchestrator;
pub use rag_pipeline::{RagOutcome, RagPipeline};
pub use router::QueryRouter;
pub use session_store::{MemorySessionStore, SessionStore};
pub use types::{
    ConversationState, RetrievedDocument, RoutingDecision, Session, ToolInvocationRecord,
    ToolResult, Turn, TurnResult, TurnRole,
};
