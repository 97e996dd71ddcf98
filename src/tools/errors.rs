//! Tool adapter error types.

use thiserror::Error;

/// Errors raised by the tool layer.
///
/// A user that cannot be found is NOT an error; adapters return a
/// not-found [`ToolOutput`](super::adapters::ToolOutput) instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that does not exist.
    #[error("unknown tool: '{name}'")]
    UnknownTool {
        name: String,
    },

    /// Tool call arguments failed validation.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments {
        tool: String,
        reason: String,
    },

    /// The user directory fixture could not be read or parsed.
    #[error("failed to load user directory from {source_name}: {reason}")]
    DirectoryLoad {
        source_name: String,
        reason: String,
    },
}
