//! Assistant configuration loading.
//!
//! Reads `config/assistant.yaml`, resolves `${VAR}` / `${VAR:-default}`
//! environment references, and hands each component its own section. The
//! startup routine is the only place this is loaded; components receive their
//! section by value.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::inference::ModelsConfig;

/// Env var that points directly at a config file.
pub const CONFIG_ENV_VAR: &str = "HYBRID_ASSISTANT_CONFIG";

/// Path of the config file relative to a project root.
const CONFIG_RELATIVE_PATH: &str = "config/assistant.yaml";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while locating or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find {CONFIG_RELATIVE_PATH} (set {CONFIG_ENV_VAR} to override)")]
    NotFound,

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// Top-level assistant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub inference: ModelsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Optional YAML file replacing the bundled user directory fixture.
    #[serde(default)]
    pub users_path: Option<PathBuf>,
}

/// Vector index and embedding endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of an OpenAI-compatible `/embeddings` endpoint.
    #[serde(default = "default_embedding_base_url")]
    pub embedding_base_url: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    /// JSON-lines export of pre-embedded chunks from the ingestion job.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Documents requested per similarity search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on the context block handed to the answer model.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_base_url: default_embedding_base_url(),
            embedding_model: None,
            embedding_api_key: None,
            index_path: None,
            top_k: default_top_k(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_top_k() -> usize {
    4
}
fn default_max_context_tokens() -> u32 {
    3_000
}

/// Tool-calling agent loop bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations per turn before reporting non-convergence.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Serialized tool results longer than this are truncated.
    #[serde(default = "default_max_tool_result_chars")]
    pub max_tool_result_chars: usize,
    /// Nudges allowed when the model replies with neither text nor tool calls.
    #[serde(default = "default_max_empty_retries")]
    pub max_empty_retries: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tool_result_chars: default_max_tool_result_chars(),
            max_empty_retries: default_max_empty_retries(),
        }
    }
}

fn default_max_iterations() -> usize {
    8
}
fn default_max_tool_result_chars() -> usize {
    6_000
}
fn default_max_empty_retries() -> usize {
    2
}

/// Query router vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_entity_names")]
    pub entity_names: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            entity_names: default_entity_names(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    [
        "profile",
        "stats",
        "activity",
        "followers",
        "posts",
        "engagement",
        "recent activity",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_entity_names() -> Vec<String> {
    ["ana", "sarah", "james", "priya", "marco"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Where sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    /// SQLite file path. Defaults to `sessions.db` in the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AssistantConfig {
    /// Parse config text after env-var interpolation.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw);
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }
}

/// Locate the config file.
///
/// `HYBRID_ASSISTANT_CONFIG` wins when it names an existing file; otherwise
/// walk upward from `start` looking for `config/assistant.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&explicit));
        if candidate.is_file() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} does not name a file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound)
}

/// Load and parse the config file at `path`.
///
/// Relative file paths in the config are resolved against the project root,
/// the directory containing `config/`.
pub fn load_config(path: &Path) -> Result<AssistantConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut config = AssistantConfig::from_yaml_str(&raw)?;
    let config_dir = path.parent().unwrap_or(Path::new("."));
    let root = match config_dir.file_name() {
        Some(name) if name == "config" => config_dir.parent().unwrap_or(config_dir),
        _ => config_dir,
    };
    config.resolve_paths(root);
    Ok(config)
}

impl AssistantConfig {
    /// Anchor relative paths at `root`; empty paths (an unset `${VAR}`) count as absent.
    fn resolve_paths(&mut self, root: &Path) {
        for slot in [
            &mut self.retrieval.index_path,
            &mut self.users_path,
            &mut self.sessions.path,
        ] {
            *slot = slot.take().and_then(|p| anchor_path(p, root));
        }
    }
}

fn anchor_path(path: PathBuf, root: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        None
    } else if path.is_relative() {
        Some(root.join(path))
    } else {
        Some(path)
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
pub(crate) fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let expr: String = chars.by_ref().take_while(|&c| c != '}').collect();
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. Unset variables without a default become `""`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
inference:
  active_model: gemini
  models:
    gemini:
      display_name: "Gemini Flash"
      base_url: "https://generativelanguage.googleapis.com/v1beta/openai"
      model_name: "gemini-flash-latest"
      api_key: "${__HA_TEST_UNSET_KEY__}"
"#;

    #[test]
    fn test_interpolate_with_default() {
        std::env::remove_var("__HA_TEST_NONEXISTENT__");
        assert_eq!(
            interpolate_env_vars("${__HA_TEST_NONEXISTENT__:-/fallback/path}"),
            "/fallback/path"
        );
    }

    #[test]
    fn test_interpolate_with_value() {
        std::env::set_var("__HA_TEST_VAR__", "/custom/path");
        assert_eq!(
            interpolate_env_vars("dir: ${__HA_TEST_VAR__:-/fallback}/x"),
            "dir: /custom/path/x"
        );
        std::env::remove_var("__HA_TEST_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain $text with no {variables}";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/data");
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/data"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AssistantConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.sessions.backend, SessionBackend::Memory);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.router.keywords.contains(&"recent activity".to_string()));
        assert_eq!(config.router.entity_names.len(), 5);
        let gemini = config.inference.models.get("gemini").unwrap();
        assert!(gemini.api_key().is_none(), "unset env var yields no key");
    }

    #[test]
    fn test_sections_override_defaults() {
        let yaml = format!(
            "{MINIMAL}\nretrieval:\n  top_k: 6\nagent:\n  max_iterations: 3\n\
             sessions:\n  backend: sqlite\n  path: /tmp/s.db\nlogging:\n  format: json\n"
        );
        let config = AssistantConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.max_empty_retries, 2);
        assert_eq!(config.sessions.backend, SessionBackend::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = AssistantConfig::from_yaml_str("inference: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_find_config_walks_upward() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("config")).unwrap();
        std::fs::write(root.path().join(CONFIG_RELATIVE_PATH), MINIMAL).unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        std::env::remove_var(CONFIG_ENV_VAR);
        let found = find_config_path(&nested).unwrap();
        assert_eq!(found, root.path().join(CONFIG_RELATIVE_PATH));
        assert!(load_config(&found).is_ok());
    }

    #[test]
    fn test_relative_paths_anchor_at_project_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("config")).unwrap();
        let yaml = format!(
            "{MINIMAL}\nretrieval:\n  index_path: data/index.jsonl\n\
             users_path: \"${{__HA_TEST_UNSET_USERS__}}\"\n\
             sessions:\n  path: /abs/sessions.db\n"
        );
        let path = root.path().join(CONFIG_RELATIVE_PATH);
        std::fs::write(&path, yaml).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.retrieval.index_path,
            Some(root.path().join("data/index.jsonl"))
        );
        assert_eq!(config.users_path, None);
        assert_eq!(config.sessions.path, Some(PathBuf::from("/abs/sessions.db")));
    }
}
