//! Embedding provider client.
//!
//! Providers turn sanitized query text into a fixed-dimension vector. They are
//! called at most once per request, with no retries: a failure is reported
//! immediately so the orchestrator can fall back to lexical search.

mod ollama;

pub use ollama::OllamaProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider failures. Never shown to API callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its time budget.
    #[error("embedding provider timed out after {0}ms")]
    Timeout(u64),

    /// The provider answered with an error or an unusable payload.
    #[error("embedding provider error: {0}")]
    Error(String),
}

impl ProviderError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Unavailable(_) => "provider_unavailable",
            ProviderError::Timeout(_) => "provider_timeout",
            ProviderError::Error(_) => "provider_error",
        }
    }
}

/// Provider metadata for logs and health output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name (e.g., "ollama")
    pub name: String,
    /// Model used for embeddings
    pub model: String,
    /// Output dimension
    pub dimension: usize,
}

/// Provider health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Whether the provider is available
    pub available: bool,
    /// Response latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Last error message if any
    pub last_error: Option<String>,
}

/// Text → vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;

    /// Embed one text. Implementations must not retry.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Check if the provider is reachable.
    async fn is_available(&self) -> bool {
        true
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = std::time::Instant::now();
        let available = self.is_available().await;
        ProviderHealth {
            available,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            last_error: None,
        }
    }
}
