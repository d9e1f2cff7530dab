//! Configuration schema (nl2sql.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `model.server_url`
pub const MODEL_SERVER_URL_ENV: &str = "MODEL_SERVER_URL";

/// SQL dialect used to tokenize DDL files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI SQL
    Generic,

    /// SQLite SQL dialect
    Sqlite,

    /// PostgreSQL SQL dialect
    Postgres,

    /// MySQL SQL dialect
    Mysql,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Sqlite
    }
}

/// Where metadata and uploaded database files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Metadata store file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Directory uploaded database files are copied into
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("metadata_store.db")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploaded_dbs")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

impl StoreConfig {
    /// Path of an uploaded database file by its id
    pub fn database_path(&self, db_id: &str) -> PathBuf {
        self.uploads_dir.join(db_id)
    }
}

/// Where table and column intents come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    /// The model server's `/generate_intents` endpoint
    Service,

    /// Few-shot prompt sent to a chat-completions endpoint
    Completion,
}

impl Default for IntentSource {
    fn default() -> Self {
        Self::Service
    }
}

/// Model serving endpoint (intent and SQL generation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the model server
    #[serde(default)]
    pub server_url: Option<String>,

    /// Request timeout; no timeout when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub intent_source: IntentSource,

    /// Chat-completions base URL for the completion intent source
    #[serde(default = "default_openai_url")]
    pub completion_base_url: String,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Environment variable holding the completion API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            timeout_secs: None,
            intent_source: IntentSource::default(),
            completion_base_url: default_openai_url(),
            completion_model: default_completion_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Embedding backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local hashed bag-of-words vectors
    Hashing,

    /// OpenAI-compatible `/embeddings` endpoint
    Http,
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        Self::Hashing
    }
}

/// Sentence embedding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Vector length for the hashing provider
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Base URL for the http provider
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Model name for the http provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout for the http provider; no timeout when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_dimension() -> usize {
    512
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimension: default_dimension(),
            base_url: default_openai_url(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: None,
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of tables to select per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// DDL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            store: StoreConfig::default(),
            model: ModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".to_string()));
        }
        if config.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be at least 1".to_string()));
        }

        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply environment overrides (`MODEL_SERVER_URL`)
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(MODEL_SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                self.model.server_url = Some(url.trim().to_string());
            }
        }
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.project_root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Absolute metadata store path
    pub fn store_path(&self) -> PathBuf {
        self.resolve(&self.store.path)
    }

    /// Absolute uploads directory
    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.store.uploads_dir)
    }

    /// Model server URL, required by the intent service and question answering
    pub fn require_server_url(&self) -> Result<&str, ConfigError> {
        self.model
            .server_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid(format!(
                "No model server configured. Set [model] server_url or {}",
                MODEL_SERVER_URL_ENV
            )))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
