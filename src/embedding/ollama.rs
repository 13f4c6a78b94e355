//! Ollama-compatible HTTP embedding client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{EmbeddingProvider, ProviderError, ProviderMetadata};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Timeout for the health probe, independent of the embedding timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Client for `POST {base_url}/api/embeddings`.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig, dimension: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension,
            timeout: config.timeout(),
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }

    fn map_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_connect() {
            ProviderError::Unavailable(err.to_string())
        } else {
            ProviderError::Error(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "ollama".to_string(),
            model: self.model.clone(),
            dimension: self.dimension,
        }
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Embedding provider returned an error status");
            return Err(ProviderError::Error(format!("HTTP {}", status)));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| self.map_error(e))?;
        if body.embedding.len() != self.dimension {
            return Err(ProviderError::Error(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                body.embedding.len()
            )));
        }

        debug!(dim = body.embedding.len(), "Generated query embedding");
        Ok(body.embedding)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
