//! Configuration management for EDITH.
//!
//! Configuration is assembled once at startup from, in increasing precedence:
//! - Built-in defaults
//! - The YAML config file (`.edith/config.yaml` or `EDITH_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The result is validated and then treated as immutable: each component
//! receives the section it needs through its constructor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Generation backends known to the LLM factory.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["ollama", "openai", "llamacpp", "gguf", "echo"];

/// Embedding providers known to the embedding factory.
pub const KNOWN_EMBEDDING_PROVIDERS: &[&str] = &["trigram", "ollama"];

/// Vector index backends.
pub const KNOWN_INDEX_BACKENDS: &[&str] = &["sqlite", "memory"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .edith/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub index: IndexSettings,
    pub resilience: ResilienceSettings,
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Backend registry key ("ollama", "openai", "echo")
    pub provider: String,

    /// Model identifier passed to the backend
    pub model: String,

    /// Custom endpoint URL
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Resolved API key (never written back to disk)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Token budgets per answer mode
    pub max_tokens: TokenBudgets,
}

/// Maximum generated tokens per mode.
///
/// Casual replies get the tightest budget; grounded answers need room to cite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenBudgets {
    pub knowledge: u32,
    pub hybrid: u32,
    pub casual: u32,
    pub summary: u32,
    pub analyze: u32,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,

    /// Inputs longer than this many characters are truncated before embedding
    pub max_input_chars: usize,

    /// Fragments embedded and upserted per ingestion batch
    pub batch_size: usize,

    pub endpoint: Option<String>,
}

/// Chunker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,

    /// How far back from the nominal end a boundary may be searched for
    pub boundary_window: usize,
}

/// Retrieval and context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_context_chars: usize,
    pub summary_top_k: usize,
    pub summary_max_context_chars: usize,
    pub max_history_turns: usize,
}

/// Vector index location and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    /// "sqlite" or "memory"
    pub backend: String,

    /// Opaque index name
    pub namespace: String,

    /// Explicit database path (defaults under .edith/index/)
    pub path: Option<PathBuf>,

    /// Maximum number of entries, unbounded when absent
    pub capacity: Option<usize>,
}

/// Retry and timeout settings for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResilienceSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub embed_timeout_secs: u64,
    pub index_timeout_secs: u64,
    pub generate_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: TokenBudgets::default(),
        }
    }
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            knowledge: 1024,
            hybrid: 512,
            casual: 256,
            summary: 1024,
            analyze: 768,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            max_input_chars: 2000,
            batch_size: 10,
            endpoint: None,
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            boundary_window: 200,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            max_context_chars: 2000,
            summary_top_k: 10,
            summary_max_context_chars: 3000,
            max_history_turns: 6,
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            namespace: "notes".to_string(),
            path: None,
            capacity: None,
        }
    }
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            embed_timeout_secs: 30,
            index_timeout_secs: 10,
            generate_timeout_secs: 120,
        }
    }
}

impl ResilienceSettings {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
    index: Option<IndexSettings>,
    resilience: Option<ResilienceSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            index: IndexSettings::default(),
            resilience: ResilienceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `EDITH_WORKSPACE`: Override workspace path
    /// - `EDITH_CONFIG`: Path to config file
    /// - `EDITH_PROVIDER` / `EDITH_MODEL` / `EDITH_ENDPOINT`: Generation backend
    /// - `EDITH_API_KEY`: API key for OpenAI-compatible servers
    /// - `EDITH_EMBEDDING_PROVIDER`: Embedding provider
    /// - `EDITH_TOP_K` / `EDITH_SIMILARITY_THRESHOLD`: Retrieval tuning
    /// - `EDITH_INDEX`: Index namespace
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// The returned config is not yet validated; call [`AppConfig::validate`]
    /// after applying CLI overrides.
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("EDITH_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("EDITH_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".edith/config.yaml"));

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        }

        config.apply_env()?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    pub fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        if let Some(llm) = file.llm {
            self.llm = llm;
        }
        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(chunking) = file.chunking {
            self.chunking = chunking;
        }
        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(index) = file.index {
            self.index = index;
        }
        if let Some(resilience) = file.resilience {
            self.resilience = resilience;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(())
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(provider) = std::env::var("EDITH_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("EDITH_MODEL") {
            self.llm.model = model;
        }
        if let Ok(endpoint) = std::env::var("EDITH_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Ok(key) = std::env::var("EDITH_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("EDITH_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(top_k) = env_parse::<usize>("EDITH_TOP_K")? {
            self.retrieval.top_k = top_k;
        }
        if let Some(threshold) = env_parse::<f32>("EDITH_SIMILARITY_THRESHOLD")? {
            self.retrieval.similarity_threshold = threshold;
        }
        if let Ok(namespace) = std::env::var("EDITH_INDEX") {
            self.index.namespace = namespace;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .edith directory.
    pub fn edith_dir(&self) -> PathBuf {
        self.workspace.join(".edith")
    }

    /// Ensure the .edith directory exists.
    pub fn ensure_edith_dir(&self) -> AppResult<()> {
        let dir = self.edith_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .edith directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Location of the persisted index for the configured namespace.
    pub fn index_path(&self) -> PathBuf {
        match &self.index.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace.join(path),
            None => self
                .edith_dir()
                .join("index")
                .join(format!("{}.sqlite", self.index.namespace)),
        }
    }

    /// Resolve the API key for the generation backend.
    ///
    /// An explicit key (`EDITH_API_KEY`) wins over `llm.apiKeyEnv`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.llm.api_key {
            return Some(key.clone());
        }

        self.llm
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }

    /// Validate the configuration.
    ///
    /// Every check here is a startup failure: nothing downstream re-validates
    /// these values at request time.
    pub fn validate(&self) -> AppResult<()> {
        ensure_known("LLM provider", &self.llm.provider, KNOWN_LLM_PROVIDERS)?;
        ensure_known(
            "embedding provider",
            &self.embedding.provider,
            KNOWN_EMBEDDING_PROVIDERS,
        )?;
        ensure_known("index backend", &self.index.backend, KNOWN_INDEX_BACKENDS)?;

        if let Some(ref var) = self.llm.api_key_env {
            if self.llm.api_key.is_none() && std::env::var(var).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    var
                )));
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }

        let budgets = &self.llm.max_tokens;
        for (mode, budget) in [
            ("knowledge", budgets.knowledge),
            ("hybrid", budgets.hybrid),
            ("casual", budgets.casual),
            ("summary", budgets.summary),
            ("analyze", budgets.analyze),
        ] {
            if budget == 0 {
                return Err(AppError::Config(format!(
                    "llm.maxTokens.{} must be greater than zero",
                    mode
                )));
            }
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.embedding.max_input_chars == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.maxInputChars and embedding.batchSize must be greater than zero"
                    .to_string(),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "chunking.chunkSize must be greater than zero".to_string(),
            ));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunkSize ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }

        let retrieval = &self.retrieval;
        if retrieval.top_k == 0 || retrieval.summary_top_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK and retrieval.summaryTopK must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&retrieval.similarity_threshold) {
            return Err(AppError::Config(format!(
                "retrieval.similarityThreshold must be within -1.0..=1.0, got {}",
                retrieval.similarity_threshold
            )));
        }
        if retrieval.max_context_chars == 0 || retrieval.summary_max_context_chars == 0 {
            return Err(AppError::Config(
                "context budgets must be greater than zero".to_string(),
            ));
        }
        // A budget below one fragment would drop every retrieved block
        let smallest_budget = retrieval
            .max_context_chars
            .min(retrieval.summary_max_context_chars);
        if smallest_budget < self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "context budgets ({} / {}) must hold at least one fragment of chunking.chunkSize {}",
                retrieval.max_context_chars,
                retrieval.summary_max_context_chars,
                self.chunking.chunk_size
            )));
        }

        if self.index.namespace.trim().is_empty() {
            return Err(AppError::Config("index.namespace cannot be empty".to_string()));
        }
        if self.index.capacity == Some(0) {
            return Err(AppError::Config(
                "index.capacity must be greater than zero when set".to_string(),
            ));
        }

        let resilience = &self.resilience;
        if resilience.max_attempts == 0 {
            return Err(AppError::Config(
                "resilience.maxAttempts must be at least 1".to_string(),
            ));
        }
        if resilience.embed_timeout_secs == 0
            || resilience.index_timeout_secs == 0
            || resilience.generate_timeout_secs == 0
        {
            return Err(AppError::Config(
                "resilience timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn ensure_known(what: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            what,
            value,
            known.join(", ")
        )))
    }
}

fn env_parse<T: FromStr>(var: &str) -> AppResult<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {:?}", var, raw))),
        Err(_) => Ok(None),
    }
}
