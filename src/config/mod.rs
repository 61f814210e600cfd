//! Configuration management for hybrid-rerank
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and validates every section before the engine sees it.

use crate::error::{Result, RerankError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Current configuration schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "HYBRID_RERANK_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub ingestion: IngestionConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub lexical: LexicalConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage locations. Relative paths resolve under `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub index_dir: PathBuf,
    pub sources_file: PathBuf,
}

/// Ingestion limits for turning text into chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub max_words: usize,
    pub min_paragraph_chars: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Nearest-neighbor backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Exact brute-force search
    Flat,
    /// Approximate HNSW graph search
    Hnsw,
}

impl std::str::FromStr for VectorBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "hnsw" => Ok(Self::Hnsw),
            other => Err(format!("Unknown vector backend '{}' (expected flat or hnsw)", other)),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub backend: VectorBackend,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

/// BM25 constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
}

/// Score fusion and candidate pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight of the semantic signal; lexical gets `1 - alpha`
    pub alpha: f32,
    /// Number of vector hits reranked per query
    pub candidate_pool: usize,
    pub default_top_k: usize,
}

/// Query server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub max_connections: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_pool: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_backend: Option<VectorBackend>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_words: 120,
            min_paragraph_chars: 40,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Flat,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            candidate_pool: 20,
            default_top_k: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            max_connections: 64,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RerankError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RerankError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RerankError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RerankError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(alpha) = overrides.alpha {
            self.retrieval.alpha = alpha;
        }
        if let Some(pool) = overrides.candidate_pool {
            self.retrieval.candidate_pool = pool;
        }
        if let Some(backend) = overrides.vector_backend {
            self.vector.backend = backend;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: HYBRID_RERANK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |message: String| RerankError::InvalidConfigValue {
            path: path.to_string(),
            message,
        };

        match path {
            "RETRIEVAL__ALPHA" => {
                self.retrieval.alpha = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as float", value)))?;
            }
            "RETRIEVAL__CANDIDATE_POOL" => {
                self.retrieval.candidate_pool = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
            }
            "RETRIEVAL__DEFAULT_TOP_K" => {
                self.retrieval.default_top_k = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
            }
            "VECTOR__BACKEND" => {
                self.vector.backend = value.parse().map_err(invalid)?;
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "SERVER__BIND" => {
                self.server.bind = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Resolve a storage path against the data directory, expanding `~/`
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf> {
        let path = expand_home(path)?;
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(expand_home(&self.storage.data_dir)?.join(path))
        }
    }

    /// Absolute path of the chunk database
    pub fn database_path(&self) -> Result<PathBuf> {
        self.resolve_path(&self.storage.database)
    }

    /// Absolute path of the index artifact directory
    pub fn index_path(&self) -> Result<PathBuf> {
        self.resolve_path(&self.storage.index_dir)
    }

    /// Absolute path of the source catalog
    pub fn sources_path(&self) -> Result<PathBuf> {
        self.resolve_path(&self.storage.sources_file)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RerankError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("hybrid-rerank").join("config.toml"))
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RerankError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RerankError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.hybrid-rerank"),
                database: PathBuf::from("chunks.db"),
                index_dir: PathBuf::from("index"),
                sources_file: PathBuf::from("sources.json"),
            },
            ingestion: IngestionConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector: VectorConfig::default(),
            lexical: LexicalConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
