//! Service configuration.
//!
//! Loaded from a TOML file (see `glossary-search init`). Every section has
//! defaults so a partial file is enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metrics::MetricsConfig;

/// Default embedding dimension (bge-m3).
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

/// Default number of results when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 5;

/// Hard upper bound for the result limit.
pub const MAX_LIMIT: usize = 20;

/// Shortest query length the filter may be configured to accept.
pub const MIN_QUERY_LENGTH: usize = 2;

/// Longest query length the filter may be configured to accept.
pub const MAX_QUERY_LENGTH: usize = 200;

/// Word list shipped with the service.
pub const DEFAULT_BLOCKED_WORDS_PATH: &str = "data/blocked_words.txt";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub filter: FilterConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub metrics: MetricsConfig,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Socket address to bind.
    pub listen_address: String,
    /// Enable CORS headers.
    pub cors_enabled: bool,
    /// Allowed origins; empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Content filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Word list, one token per line, `#` comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_words_path: Option<PathBuf>,
    /// Minimum sanitized query length (characters).
    pub min_length: usize,
    /// Maximum sanitized query length (characters).
    pub max_length: usize,
    /// Longest allowed run of one repeated character.
    pub max_repeat_run: usize,
    /// Maximum ratio of non-alphanumeric, non-whitespace characters.
    pub max_special_ratio: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blocked_words_path: Some(PathBuf::from(DEFAULT_BLOCKED_WORDS_PATH)),
            min_length: MIN_QUERY_LENGTH,
            max_length: MAX_QUERY_LENGTH,
            max_repeat_run: 5,
            max_special_ratio: 0.3,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider base URL (Ollama-compatible).
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Hard timeout for one embedding call.
    pub timeout_ms: u64,
    /// Number of query embeddings kept in memory (0 disables the cache).
    pub cache_capacity: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            timeout_ms: 3_000,
            cache_capacity: 1_024,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which nearest-neighbor backend answers vector queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Exact scan over the embeddings stored in the corpus file.
    #[default]
    Memory,
    /// External Qdrant collection.
    Qdrant,
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// JSON Lines corpus produced by the ingestion job.
    pub corpus_path: PathBuf,
    /// Vector dimension expected from the provider and the index.
    pub embedding_dim: usize,
    /// Limit used when the caller gives none.
    pub default_limit: usize,
    /// Upper bound accepted for `limit`.
    pub max_limit: usize,
    pub vector_backend: VectorBackend,
    pub qdrant_url: String,
    pub qdrant_collection: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/glossary.jsonl"),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            vector_backend: VectorBackend::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "glossary_embeddings".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ServiceConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let filter = &self.filter;
        if filter.min_length < MIN_QUERY_LENGTH
            || filter.max_length > MAX_QUERY_LENGTH
            || filter.min_length > filter.max_length
        {
            return Err(Error::Config(format!(
                "filter length bounds [{}, {}] must lie within [{}, {}]",
                filter.min_length, filter.max_length, MIN_QUERY_LENGTH, MAX_QUERY_LENGTH
            )));
        }
        if !(0.0..=1.0).contains(&filter.max_special_ratio) {
            return Err(Error::Config(
                "filter.max_special_ratio must be within [0, 1]".to_string(),
            ));
        }
        if filter.max_repeat_run == 0 {
            return Err(Error::Config(
                "filter.max_repeat_run must be greater than 0".to_string(),
            ));
        }

        let search = &self.search;
        if search.embedding_dim == 0 {
            return Err(Error::Config(
                "search.embedding_dim must be greater than 0".to_string(),
            ));
        }
        if search.max_limit == 0 || search.max_limit > MAX_LIMIT {
            return Err(Error::Config(format!(
                "search.max_limit must be within [1, {}]",
                MAX_LIMIT
            )));
        }
        if search.default_limit == 0 || search.default_limit > search.max_limit {
            return Err(Error::Config(format!(
                "search.default_limit must be within [1, {}]",
                search.max_limit
            )));
        }

        if self.embedding.timeout_ms == 0 {
            return Err(Error::Config(
                "embedding.timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.embedding_dim, 1024);
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.search.max_limit, 20);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ServiceConfig::default();
        config.embedding.timeout_ms = 750;
        config.search.vector_backend = VectorBackend::Qdrant;
        config.save(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded.embedding.timeout_ms, 750);
        assert_eq!(loaded.search.vector_backend, VectorBackend::Qdrant);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[embedding]\nmodel = \"custom\"\n").unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded.embedding.model, "custom");
        assert_eq!(loaded.filter.max_length, 200);
    }

    #[test]
    fn test_rejects_limit_above_hard_cap() {
        let mut config = ServiceConfig::default();
        config.search.max_limit = 50;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_limit"));
    }

    #[test]
    fn test_rejects_inverted_length_bounds() {
        let mut config = ServiceConfig::default();
        config.filter.min_length = 150;
        config.filter.max_length = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_length_bounds_outside_hard_range() {
        let mut config = ServiceConfig::default();
        config.filter.min_length = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filter length bounds"));

        let mut config = ServiceConfig::default();
        config.filter.max_length = 5000;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.filter.min_length = 3;
        config.filter.max_length = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_blocklist_is_shipped_file() {
        let config = FilterConfig::default();
        assert_eq!(
            config.blocked_words_path.as_deref(),
            Some(Path::new(DEFAULT_BLOCKED_WORDS_PATH))
        );
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_BLOCKED_WORDS_PATH);
        let words = crate::filter::BlockedWordSet::from_file(shipped).unwrap();
        assert!(words.contains("hate"));
    }
}
