//! OpenAI-compatible inference client.
//!
//! Sends chat completion requests to the configured endpoint and walks the
//! fallback chain when the current model is unavailable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::{resolve_model_chain, ModelConfig, ModelsConfig};
use super::errors::InferenceError;
use super::model::LanguageModel;
use super::response::parse_completion_response;
use super::types::{ChatCompletionRequest, ChatMessage, ModelReply, ToolDefinition};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the language-model endpoint(s).
///
/// Holds the resolved model chain (active model first). Each call starts at
/// the head of the chain, so one flaky request does not pin later calls to a
/// fallback model.
pub struct InferenceClient {
    http: HttpClient,
    chain: Vec<(String, ModelConfig)>,
    request_timeout: Duration,
}

impl InferenceClient {
    /// Create a client from the model registry. Does NOT check connectivity.
    pub fn from_config(config: &ModelsConfig) -> Result<Self, InferenceError> {
        let chain = resolve_model_chain(config)?;
        let request_timeout = Duration::from_secs(config.request_timeout_secs.max(1));

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: chain[0].1.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            chain,
            request_timeout,
        })
    }

    /// Display name of the active model.
    pub fn current_model_name(&self) -> &str {
        &self.chain[0].1.display_name
    }

    /// Registry keys in the order they will be tried.
    pub fn chain_keys(&self) -> Vec<&str> {
        self.chain.iter().map(|(k, _)| k.as_str()).collect()
    }

    // ─── Chat Completion ─────────────────────────────────────────────────

    /// Send a non-streaming chat completion request, falling back through the
    /// chain on retriable failures.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        let mut attempted = Vec::new();
        let mut last_error: Option<InferenceError> = None;

        for (key, model) in &self.chain {
            match self.try_request(key, model, messages, tools).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(model = %key, error = %e, "model unavailable, trying next in chain");
                    attempted.push(key.clone());
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if attempted.len() == 1 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Err(InferenceError::AllModelsUnavailable { attempted })
    }

    /// Attempt a single request to one model.
    async fn try_request(
        &self,
        key: &str,
        model: &ModelConfig,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        let url = format!("{}/chat/completions", model.base_url.trim_end_matches('/'));
        let has_tools = !tools.is_empty();

        let body = ChatCompletionRequest {
            model: model.model_name.clone().unwrap_or_else(|| key.to_string()),
            messages: messages.to_vec(),
            tools: has_tools.then(|| tools.to_vec()),
            tool_choice: has_tools.then(|| "auto".to_string()),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            stream: false,
        };

        // Request metadata only; bodies can be large.
        tracing::debug!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = tools.len(),
            "=== LLM REQUEST ==="
        );

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = model.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.request_timeout.as_secs(),
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.request_timeout.as_secs(),
                }
            } else {
                InferenceError::MalformedResponse {
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        parse_completion_response(&body_text, model.tool_call_format, tools)
    }

    // ─── Health Check ────────────────────────────────────────────────────

    /// Check if the active model endpoint is reachable. Consumes no tokens.
    pub async fn health_check(&self) -> bool {
        let model = &self.chain[0].1;
        let url = format!("{}/models", model.base_url.trim_end_matches('/'));
        let mut request = self.http.get(&url).timeout(CONNECT_TIMEOUT);
        if let Some(key) = model.api_key() {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LanguageModel for InferenceClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        self.chat_completion(messages, tools).await
    }

    fn name(&self) -> &str {
        self.current_model_name()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
