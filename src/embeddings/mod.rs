// Embeddings module
// Text to vector conversion behind a backend-neutral trait


pub mod ollama;
pub mod openai;
pub mod predict;

use serde::{Deserialize, Serialize};

use crate::config::{EmbedderBackend, EmbedderConfig};
use crate::{RagError, Result};

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use predict::PredictEmbedder;

/// Fixed-length vector representing the semantic content of a text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap raw model output, rejecting empty or non-finite vectors.
    #[inline]
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(RagError::Embedding("model returned an empty vector".into()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(RagError::Embedding(format!(
                "model returned a non-finite value at position {}",
                pos
            )));
        }
        Ok(Self(values))
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for Embedding {
    #[inline]
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Turns text into embeddings.
///
/// Implementations must be deterministic per text: embedding a text alone or
/// inside a batch yields the same vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed every text, preserving input order. Fails as a whole if any
    /// single text cannot be embedded.
    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let embeddings = texts
            .iter()
            .map(|text| self.embed(text))
            .collect::<Result<Vec<_>>>()?;
        ensure_uniform_dimension(&embeddings)?;
        Ok(embeddings)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        (**self).embed_many(texts)
    }
}

/// Every embedding of one batch must share a dimensionality.
#[inline]
pub fn ensure_uniform_dimension(embeddings: &[Embedding]) -> Result<()> {
    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    let expected = first.dimension();
    match embeddings.iter().find(|e| e.dimension() != expected) {
        Some(odd) => Err(RagError::Embedding(format!(
            "inconsistent dimensionality in batch: {} vs {}",
            expected,
            odd.dimension()
        ))),
        None => Ok(()),
    }
}

/// Average token vectors into a single vector.
#[inline]
pub fn mean_pool(token_vectors: &[Vec<f32>]) -> Result<Embedding> {
    let Some(first) = token_vectors.first() else {
        return Err(RagError::Embedding("cannot pool an empty token matrix".into()));
    };
    let dimension = first.len();
    let mut sums = vec![0.0_f32; dimension];

    for row in token_vectors {
        if row.len() != dimension {
            return Err(RagError::Embedding(format!(
                "ragged token matrix: expected rows of {} values, found {}",
                dimension,
                row.len()
            )));
        }
        for (sum, value) in sums.iter_mut().zip(row) {
            *sum += value;
        }
    }

    let count = token_vectors.len() as f32;
    Embedding::new(sums.into_iter().map(|sum| sum / count).collect())
}

/// Build the embedder selected in configuration.
#[inline]
pub fn from_config(config: &EmbedderConfig) -> Result<Box<dyn Embedder>> {
    Ok(match config.backend {
        EmbedderBackend::Ollama => Box::new(OllamaEmbedder::new(config)?),
        EmbedderBackend::Predict => Box::new(PredictEmbedder::new(config)?),
        EmbedderBackend::OpenAi => Box::new(OpenAiEmbedder::new(config)?),
    })
}
