//! History-aware retrieval pipeline.
//!
//! Two stages: rewrite the input into a standalone question using the chat
//! history, then retrieve documents for that question and synthesize an
//! answer from them. Retrieval failures degrade to an empty context; model
//! failures fail the turn.

use std::sync::Arc;

use super::errors::AgentError;
use super::tokens::{estimate_tokens, max_bytes_for_tokens, truncate_utf8};
use super::types::{ConversationState, RetrievedDocument, RoutingDecision};
use crate::config::RetrievalConfig;
use crate::inference::model::LanguageModel;
use crate::inference::types::ChatMessage;
use crate::retrieval::VectorIndex;

pub const REFORMULATION_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can \
be understood without the chat history. Do NOT answer the question, just reformulate it if \
needed and otherwise return it as is.";

pub const ANSWER_PROMPT: &str = "Use the following pieces of retrieved context to answer the \
question. Use three to seven sentences maximum and keep the answer concise, while still giving \
depth.";

/// Separator between documents in the context block.
const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RagOutcome {
    pub answer: String,
    /// The context block handed to the answer model.
    pub context: String,
    pub standalone_question: String,
    pub documents: Vec<RetrievedDocument>,
    /// Retrieval failed or returned nothing.
    pub degraded: bool,
}

pub struct RagPipeline {
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    max_context_tokens: u32,
}

impl RagPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            model,
            index,
            top_k: config.top_k,
            max_context_tokens: config.max_context_tokens,
        }
    }

    /// Run both stages.
    pub async fn answer(&self, state: &ConversationState) -> Result<RagOutcome, AgentError> {
        let standalone_question = self.reformulate(state).await?;
        let (documents, degraded) = self.retrieve(&standalone_question).await;
        let context = build_context(&documents, self.max_context_tokens);
        let answer = self.synthesize(state, &context).await?;

        Ok(RagOutcome {
            answer,
            context,
            standalone_question,
            documents,
            degraded,
        })
    }

    /// Stage 1. Empty history returns the input verbatim without a model call.
    pub async fn reformulate(&self, state: &ConversationState) -> Result<String, AgentError> {
        if state.chat_history.is_empty() {
            return Ok(state.input.clone());
        }

        let mut messages = Vec::with_capacity(state.chat_history.len() + 2);
        messages.push(ChatMessage::system(REFORMULATION_PROMPT));
        messages.extend(state.history_messages());
        messages.push(ChatMessage::user(state.input.clone()));

        let reply = self.model.generate(&messages, &[]).await?;
        let question = reply.trimmed_text();
        if question.is_empty() {
            tracing::warn!("reformulation returned empty text, using raw input");
            return Ok(state.input.clone());
        }

        tracing::debug!(
            input = %state.input,
            standalone = %question,
            history_turns = state.chat_history.len(),
            "question reformulated"
        );
        Ok(question.to_string())
    }

    /// Stage 2a. Returns the documents and whether retrieval degraded.
    pub async fn retrieve(&self, question: &str) -> (Vec<RetrievedDocument>, bool) {
        match self.index.similarity_search(question, self.top_k).await {
            Ok(docs) if docs.is_empty() => {
                tracing::warn!(question = %question, "retrieval returned no documents");
                (docs, true)
            }
            Ok(docs) => {
                tracing::debug!(count = docs.len(), "documents retrieved");
                (docs, false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed, continuing with empty context");
                (Vec::new(), true)
            }
        }
    }

    /// Stage 2b. The answer must be non-empty.
    pub async fn synthesize(
        &self,
        state: &ConversationState,
        context: &str,
    ) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(state.chat_history.len() + 2);
        messages.push(ChatMessage::system(format!("{ANSWER_PROMPT}\n\n{context}")));
        messages.extend(state.history_messages());
        messages.push(ChatMessage::user(state.input.clone()));

        let reply = self.model.generate(&messages, &[]).await?;
        let answer = reply.trimmed_text();
        if answer.is_empty() {
            return Err(AgentError::EmptyAnswer {
                route: RoutingDecision::Rag,
            });
        }
        Ok(answer.to_string())
    }
}

/// Concatenate documents in rank order within a token budget.
///
/// Whole documents are kept while they fit. If not even the first fits, it is
/// cut at a UTF-8 boundary.
pub fn build_context(documents: &[RetrievedDocument], max_tokens: u32) -> String {
    let mut context = String::new();
    for doc in documents {
        let candidate = if context.is_empty() {
            doc.text.clone()
        } else {
            format!("{context}{DOCUMENT_SEPARATOR}{}", doc.text)
        };
        if estimate_tokens(&candidate) > max_tokens {
            if context.is_empty() {
                context = truncate_utf8(&doc.text, max_bytes_for_tokens(max_tokens)).to_string();
            }
            tracing::debug!(
                kept = context.len(),
                max_tokens,
                "context block truncated to budget"
            );
            break;
        }
        context = candidate;
    }
    context
}

// ─── Tests ──────────────────────────────────────────────────────────────────
