
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Embedder, Embedding, mean_pool};
use crate::config::EmbedderConfig;
use crate::http::HttpTransport;
use crate::{RagError, Result};

/// Embedding backend for predict-style model endpoints.
///
/// Each text is posted as `{"inputs": text}` to the configured URL. The
/// endpoint may answer with a plain vector, a per-token matrix, a batched
/// tensor or an object wrapping a vector; matrices are mean-pooled.
#[derive(Debug, Clone)]
pub struct PredictEmbedder {
    url: Url,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictResponse {
    Vector(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
    Batch(Vec<Vec<Vec<f32>>>),
    Vectors { vectors: Vec<f32> },
    Embedding { embedding: Vec<f32> },
}

impl PredictResponse {
    fn into_embedding(self) -> Result<Embedding> {
        match self {
            Self::Vector(values)
            | Self::Vectors { vectors: values }
            | Self::Embedding { embedding: values } => Embedding::new(values),
            Self::Tokens(rows) => mean_pool(&rows),
            Self::Batch(batch) => {
                let first = batch.into_iter().next().ok_or_else(|| {
                    RagError::Embedding("model returned an empty batch".into())
                })?;
                mean_pool(&first)
            }
        }
    }
}

impl PredictEmbedder {
    #[inline]
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            transport: HttpTransport::new(Duration::from_secs(config.timeout_seconds))
                .with_retry_attempts(config.retry_attempts),
        })
    }
}

impl Embedder for PredictEmbedder {
    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Requesting embedding from {} (length: {})", self.url, text.len());

        let response_text = self
            .transport
            .post_json(&self.url, &PredictRequest { inputs: text })
            .map_err(|e| RagError::Embedding(format!("predict request failed: {}", e)))?;

        let response: PredictResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("unrecognised embedding response: {}", e))
        })?;

        response.into_embedding()
    }
}
