//! Agent Core error types.

use thiserror::Error;

use super::types::RoutingDecision;
use crate::inference::errors::InferenceError;

/// Errors that fail a turn.
///
/// Expected "not found" lookups and retrieval degradation are data, not
/// errors, and never surface here.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Language-model call failed, including malformed model output.
    #[error("model call failed: {0}")]
    Model(#[from] InferenceError),

    /// The tool-calling loop hit its iteration bound.
    #[error("agent did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// The model produced no answer text.
    #[error("model returned an empty answer on the {route} path")]
    EmptyAnswer { route: RoutingDecision },

    /// Session store read or write failed.
    #[error("session store error: {reason}")]
    SessionStore { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A tool ran but its result could not be produced.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },
}

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::SessionStore {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Serialization {
            reason: e.to_string(),
        }
    }
}
