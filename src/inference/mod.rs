//! Inference Client: OpenAI-compatible API client for language-model calls.
//!
//! This module handles all communication with the model endpoint:
//! - Non-streaming chat completions, with and without tools
//! - Tool call parsing (native JSON + pythonic formats) and argument repair
//! - Fallback chain management
//! - The `LanguageModel` trait the rest of the crate depends on
//!
//! The client speaks the OpenAI Chat Completions API, so switching between a
//! hosted model and a local runtime is a config change, not a code change.

pub mod client;
pub mod config;
pub mod errors;
pub mod model;
pub mod response;
pub mod tool_call_parser;
pub mod types;

// Re-exports for convenience
pub use client::InferenceClient;
pub use config::{ModelConfig, ModelsConfig, ToolCallFormat};
pub use errors::InferenceError;
pub use model::LanguageModel;
pub use types::{ChatMessage, ModelReply, Role, ToolCall, ToolDefinition};
