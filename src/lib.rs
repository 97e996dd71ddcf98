pub mod agent_core;
pub mod config;
pub mod inference;
pub mod retrieval;
pub mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use agent_core::{
    AgentError, AgentLoop, MemorySessionStore, Orchestrator, QueryRouter, RagPipeline,
    SessionStore, SqliteSessionStore,
};
use config::{AssistantConfig, ConfigError, LogFormat, LoggingConfig, SessionBackend};
use inference::{InferenceClient, InferenceError, LanguageModel};
use retrieval::{Embedder, HttpEmbedder, MemoryIndex, RetrievalError, VectorIndex};
use tools::{ToolAdapters, ToolError, UserDirectory};

const LOG_FILE_NAME: &str = "assistant.log";
const LOG_FILES_KEPT: u32 = 3;
const DEFAULT_LOG_FILTER: &str = "hybrid_assistant=info,warn";

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Tools(#[from] ToolError),

    #[error(transparent)]
    Sessions(#[from] AgentError),

    #[error("failed to initialize logging: {reason}")]
    Logging { reason: String },
}

/// Return the platform-standard data directory for the assistant.
///
/// - macOS: `~/Library/Application Support/hybrid-assistant/`
/// - Linux: `$XDG_DATA_HOME/hybrid-assistant/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.hybrid-assistant/` if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("hybrid-assistant");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hybrid-assistant")
}

/// Initialize the tracing subscriber, writing to `assistant.log` in the data
/// directory.
///
/// Existing logs are rotated first (assistant.log → .1 → .2 → .3). `RUST_LOG`
/// overrides `logging.filter`. Returns the log file path.
pub fn init_tracing(config: &LoggingConfig) -> Result<PathBuf, StartupError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let logging_err = |reason: String| StartupError::Logging { reason };

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| logging_err(format!("{}: {e}", log_dir.display())))?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    rotate_log_file(&log_path, LOG_FILES_KEPT);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| logging_err(format!("{}: {e}", log_path.display())))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| logging_err(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== hybrid-assistant starting ==="
    );

    Ok(log_path)
}

/// Rotate log files: `assistant.log` → `assistant.log.1` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that flushes the log file after every write, so lines survive a
/// crash.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Wire every component from configuration.
///
/// The model endpoint is probed once; an unreachable endpoint is logged, not
/// fatal, since the fallback chain may still serve requests.
pub async fn build_orchestrator(config: &AssistantConfig) -> Result<Orchestrator, StartupError> {
    let client = InferenceClient::from_config(&config.inference)?;
    if !client.health_check().await {
        tracing::warn!(model = %client.current_model_name(), "active model endpoint unreachable");
    }
    tracing::info!(chain = ?client.chain_keys(), "inference client ready");
    let model: Arc<dyn LanguageModel> = Arc::new(client);

    let retrieval = &config.retrieval;
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
        retrieval.embedding_base_url.clone(),
        retrieval.embedding_model.clone(),
        retrieval.embedding_api_key.clone(),
    )?);
    let index = match &retrieval.index_path {
        Some(path) => MemoryIndex::load_jsonl(embedder, path)?,
        None => {
            tracing::warn!("no retrieval.index_path configured; document answers get no context");
            MemoryIndex::from_chunks(embedder, Vec::new())?
        }
    };
    let index: Arc<dyn VectorIndex> = Arc::new(index);

    let directory = match &config.users_path {
        Some(path) => UserDirectory::load(path)?,
        None => UserDirectory::bundled()?,
    };
    tracing::info!(users = ?directory.user_ids(), "user directory loaded");
    let tools = ToolAdapters::new(Arc::new(directory));

    let store = open_session_store(config)?;

    Ok(Orchestrator::new(
        QueryRouter::from_config(&config.router),
        RagPipeline::new(model.clone(), index, retrieval),
        AgentLoop::new(model, tools, &config.agent),
        store,
    ))
}

fn open_session_store(config: &AssistantConfig) -> Result<Arc<dyn SessionStore>, StartupError> {
    match config.sessions.backend {
        SessionBackend::Memory => Ok(Arc::new(MemorySessionStore::new())),
        SessionBackend::Sqlite => {
            let path = config
                .sessions
                .path
                .clone()
                .unwrap_or_else(|| data_dir().join("sessions.db"));
            let store = SqliteSessionStore::open(&path)?;
            tracing::info!(path = %path.display(), "session database opened");
            Ok(Arc::new(store))
        }
    }
}
