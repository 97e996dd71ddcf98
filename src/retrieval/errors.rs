//! Retrieval error types.

use thiserror::Error;

/// Errors from embedding and vector-index operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding request failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("embedding request failed (HTTP {status}): {body}")]
    HttpError { status: u16, body: String },

    #[error("empty embedding response for {count} inputs")]
    EmptyResponse { count: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to load index from {path}: {reason}")]
    IndexLoad { path: String, reason: String },
}
