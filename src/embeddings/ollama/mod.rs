
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, Embedding, ensure_uniform_dimension};
use crate::config::EmbedderConfig;
use crate::http::{HttpTransport, endpoint};
use crate::{RagError, Result};

/// Embedding backend speaking the Ollama `/api/embed` protocol
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_seconds))
            .with_retry_attempts(config.retry_attempts);

        Ok(Self {
            base_url: config.url.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            transport,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.transport = self.transport.with_retry_attempts(attempts);
        self
    }

    /// Test connection to the Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available
            );
            Err(RagError::Embedding(format!(
                "model '{}' is not available, available models: {:?}",
                self.model, available
            )))
        }
    }

    /// List all models the server has pulled
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = endpoint(&self.base_url, "api/tags")
            .map_err(|e| RagError::Config(format!("invalid Ollama URL: {}", e)))?;

        let response_text = self
            .transport
            .get(&url)
            .map_err(|e| RagError::Embedding(format!("failed to fetch models: {}", e)))?;

        let models: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(format!("failed to parse models response: {}", e)))?;

        debug!("Found {} models", models.models.len());
        Ok(models.models)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let url = endpoint(&self.base_url, "api/embed")
            .map_err(|e| RagError::Config(format!("invalid Ollama URL: {}", e)))?;

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response_text = self
            .transport
            .post_json(&url, &request)
            .map_err(|e| RagError::Embedding(format!("Ollama embed request failed: {}", e)))?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("failed to parse embedding response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(Embedding::new)
            .collect()
    }
}

impl Embedder for OllamaEmbedder {
    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating embedding for text (length: {})", text.len());

        let mut embeddings = self.embed_single_batch(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Embedding("no embedding returned".into()))
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size) {
            results.extend(self.embed_single_batch(chunk)?);
        }

        ensure_uniform_dimension(&results)?;
        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
