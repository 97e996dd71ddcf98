//! Model registry configuration.
//!
//! The `models` section of the assistant config: which endpoints exist, which
//! one is active, and the order to fall back through when it is unavailable.

use std::collections::HashMap;

use serde::Deserialize;

use super::errors::InferenceError;

// ─── Public Types ────────────────────────────────────────────────────────────

/// Which tool-call format the model emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallFormat {
    /// Standard OpenAI JSON tool calls.
    #[default]
    NativeJson,
    /// Text-based `Tool: … Arguments: …` format.
    Pythonic,
}

/// A single model's runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub display_name: String,
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model name sent in the request. Defaults to the registry key.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Bearer token for hosted endpoints. Empty strings count as absent.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tool_call_format: ToolCallFormat,
}

impl ModelConfig {
    /// The API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Model registry section of the assistant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub active_model: String,
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    /// Upper bound for a single language-model call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolve the ordered list of models to try: the active model first, then
/// every fallback-chain entry that exists and is not already listed.
pub fn resolve_model_chain(
    config: &ModelsConfig,
) -> Result<Vec<(String, ModelConfig)>, InferenceError> {
    let mut chain: Vec<(String, ModelConfig)> = Vec::new();

    let keys = std::iter::once(&config.active_model).chain(config.fallback_chain.iter());
    for key in keys {
        if chain.iter().any(|(k, _)| k == key) {
            continue;
        }
        match config.models.get(key) {
            Some(model) => chain.push((key.clone(), model.clone())),
            None => tracing::warn!(model = %key, "model listed in config but not defined"),
        }
    }

    if chain.is_empty() {
        return Err(InferenceError::ConfigError {
            reason: format!(
                "active model '{}' not found in config and no fallback available",
                config.active_model
            ),
        });
    }

    Ok(chain)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> ModelConfig {
        ModelConfig {
            display_name: name.to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            model_name: None,
            api_key: None,
            temperature: 0.2,
            max_tokens: 512,
            tool_call_format: ToolCallFormat::NativeJson,
        }
    }

    #[test]
    fn test_chain_starts_with_active_and_dedups() {
        let mut models = HashMap::new();
        models.insert("a".to_string(), model("A"));
        models.insert("b".to_string(), model("B"));
        let config = ModelsConfig {
            active_model: "a".into(),
            models,
            fallback_chain: vec!["a".into(), "missing".into(), "b".into()],
            request_timeout_secs: 30,
        };
        let chain = resolve_model_chain(&config).unwrap();
        let keys: Vec<&str> = chain.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_chain_uses_fallback_when_active_missing() {
        let mut models = HashMap::new();
        models.insert("b".to_string(), model("B"));
        let config = ModelsConfig {
            active_model: "a".into(),
            models,
            fallback_chain: vec!["b".into()],
            request_timeout_secs: 30,
        };
        let chain = resolve_model_chain(&config).unwrap();
        assert_eq!(chain[0].0, "b");
    }

    #[test]
    fn test_chain_empty_is_error() {
        let config = ModelsConfig {
            active_model: "nonexistent".into(),
            models: HashMap::new(),
            fallback_chain: vec![],
            request_timeout_secs: 30,
        };
        assert!(resolve_model_chain(&config).is_err());
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut m = model("A");
        m.api_key = Some("  ".into());
        assert!(m.api_key().is_none());
        m.api_key = Some("secret".into());
        assert_eq!(m.api_key(), Some("secret"));
    }

    #[test]
    fn test_defaults_from_yaml() {
        let yaml = r#"
            active_model: gemini
            models:
              gemini:
                display_name: "Gemini Flash"
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai"
        "#;
        let config: ModelsConfig = serde_yaml::from_str(yaml).unwrap();
        let m = config.models.get("gemini").unwrap();
        assert_eq!(m.tool_call_format, ToolCallFormat::NativeJson);
        assert_eq!(m.max_tokens, 1024);
        assert_eq!(config.request_timeout_secs, 60);
    }
}
