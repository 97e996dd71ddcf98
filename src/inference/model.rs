//! The language-model seam.
//!
//! Everything above the inference layer talks to a `dyn LanguageModel`, so the
//! RAG pipeline and the agent loop can run against the HTTP client in
//! production and against scripted doubles in tests.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::{ChatMessage, ModelReply, ToolDefinition};

/// One model invocation: messages in, text and/or tool calls out.
///
/// `tools` empty means a plain completion (reformulation, synthesis).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "language-model"
    }
}
