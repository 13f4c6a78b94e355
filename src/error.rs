//! Crate-level error types.

use thiserror::Error;

use crate::embedding::ProviderError;
use crate::search::StorageError;

/// Errors raised while loading, configuring or serving the glossary search.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed corpus data.
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// HTTP API error.
    #[error("API error: {0}")]
    Api(String),

    /// Vector or lexical backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Embedding provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// JSON or TOML (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
