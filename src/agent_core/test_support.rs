//! Deterministic doubles for the model and the vector index.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::inference::errors::InferenceError;
use crate::inference::model::LanguageModel;
use crate::inference::types::{ChatMessage, ModelReply, ToolCall, ToolDefinition};
use crate::retrieval::{RetrievalError, RetrievedDocument, VectorIndex};
use crate::tools::{ToolAdapters, UserDirectory};

type Responder =
    Box<dyn Fn(&[ChatMessage], &[ToolDefinition]) -> Result<ModelReply, InferenceError> + Send + Sync>;

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Model double: replays a queue of replies, or answers through a closure.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelReply, InferenceError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ModelReply, InferenceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn from_fn(
        f: impl Fn(&[ChatMessage], &[ToolDefinition]) -> Result<ModelReply, InferenceError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.function.name.clone()).collect(),
        });
        // Suspend like a network call so concurrent turns interleave.
        tokio::task::yield_now().await;
        if let Some(responder) = &self.responder {
            return responder(messages, tools);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::MalformedResponse {
                    reason: "script exhausted".into(),
                })
            })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Index double: returns fixed documents and records every query.
pub struct RecordingIndex {
    documents: Vec<(String, String)>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub fn new(documents: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            documents: documents
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            documents: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(RetrievalError::EmbeddingFailed {
                reason: "connection refused".into(),
            });
        }
        Ok(self
            .documents
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (text, source))| RetrievedDocument {
                text: text.clone(),
                source: source.clone(),
                rank: i + 1,
            })
            .collect())
    }
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments,
    }
}

pub fn bundled_tools() -> ToolAdapters {
    ToolAdapters::new(Arc::new(UserDirectory::bundled().unwrap()))
}
