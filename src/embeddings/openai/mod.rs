
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Embedder, Embedding, ensure_uniform_dimension};
use crate::config::EmbedderConfig;
use crate::http::{HttpTransport, endpoint};
use crate::{RagError, Result};

/// Embedding backend for OpenAI-compatible `/v1/embeddings` endpoints.
///
/// Newlines are replaced with spaces before a text is sent.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RagError::Config("the openai embedder needs an api_key".into()))?;

        let transport = HttpTransport::new(Duration::from_secs(config.timeout_seconds))
            .with_retry_attempts(config.retry_attempts)
            .with_bearer_token(api_key);

        Ok(Self {
            base_url: config.url.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            transport,
        })
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let url = endpoint(&self.base_url, "v1/embeddings")
            .map_err(|e| RagError::Config(format!("invalid embeddings URL: {}", e)))?;

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts.iter().map(|text| text.replace('\n', " ")).collect(),
        };

        let response_text = self
            .transport
            .post_json(&url, &request)
            .map_err(|e| RagError::Embedding(format!("embeddings request failed: {}", e)))?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("failed to parse embeddings response: {}", e))
        })?;

        order_by_index(response.data, texts.len())
    }
}

/// Place each returned vector at its `index`, requiring exactly one per input.
fn order_by_index(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Embedding>> {
    if data.len() != expected {
        return Err(RagError::Embedding(format!(
            "mismatch between request and response counts: {} vs {}",
            expected,
            data.len()
        )));
    }

    let mut slots: Vec<Option<Embedding>> = vec![None; expected];
    for item in data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            RagError::Embedding(format!("response index {} is out of range", item.index))
        })?;
        if slot.is_some() {
            return Err(RagError::Embedding(format!(
                "response index {} appears twice",
                item.index
            )));
        }
        *slot = Some(Embedding::new(item.embedding)?);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| RagError::Embedding(format!("no embedding for input {}", i)))
        })
        .collect()
}

impl Embedder for OpenAiEmbedder {
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

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            results.extend(self.embed_single_batch(chunk)?);
        }

        ensure_uniform_dimension(&results)?;
        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
