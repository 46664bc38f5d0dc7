// Database module
// Vector index contract with in-memory and LanceDB backends

pub mod lancedb;
pub mod memory;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::embeddings::Embedding;
use crate::{RagError, Result};

pub use self::lancedb::{LanceCatalog, LanceIndex};
pub use memory::{MemoryCatalog, MemoryIndex};

/// Largest number of records a single upsert call may carry
pub const MAX_UPSERT_BATCH: usize = 100;

/// Metadata key holding the passage text
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the source type tag
pub const TYPE_KEY: &str = "type";

pub type Metadata = BTreeMap<String, String>;

/// Similarity metric, fixed when an index is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl Metric {
    /// Similarity of two vectors; higher means more similar for every metric.
    #[inline]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot = dot(a, b);
                let norms = dot_self(a).sqrt() * dot_self(b).sqrt();
                if norms == 0.0 { 0.0 } else { dot / norms }
            }
            Self::DotProduct => dot(a, b),
            Self::Euclidean => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>(),
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "dotproduct" | "dot" => Ok(Self::DotProduct),
            other => Err(RagError::Config(format!("unknown metric '{}'", other))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}

/// Name, dimensionality and metric of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

impl IndexSpec {
    #[inline]
    pub fn new(name: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }
}

/// A stored vector with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Embedding,
    pub metadata: Metadata,
}

impl IndexRecord {
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).map(String::as_str)
    }
}

/// One query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl Match {
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).map(String::as_str)
    }
}

/// Nearest-neighbour store of [`IndexRecord`]s.
///
/// `upsert` replaces records by id and accepts at most [`MAX_UPSERT_BATCH`]
/// records per call. `query` returns at most `top_k` matches ordered by
/// descending score. Neither operation retries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn spec(&self) -> &IndexSpec;

    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    async fn query(&self, vector: &Embedding, top_k: usize) -> Result<Vec<Match>>;

    async fn fetch(&self, id: &str) -> Result<Option<IndexRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// Administrative operations over named indexes
#[async_trait]
pub trait IndexCatalog: Send + Sync {
    type Index: VectorIndex;

    async fn exists(&self, name: &str) -> Result<bool>;

    async fn describe(&self, name: &str) -> Result<Option<IndexSpec>>;

    /// Create an index. Creating an existing index with the same dimension and
    /// metric returns it unchanged; a differing spec is an [`RagError::IndexConflict`].
    async fn create(&self, spec: &IndexSpec) -> Result<Self::Index>;

    async fn open(&self, name: &str) -> Result<Self::Index>;

    /// Drop an index and every record in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Drop and create, discarding every stored record.
    #[inline]
    async fn recreate(&self, spec: &IndexSpec) -> Result<Self::Index> {
        self.delete(&spec.name).await?;
        self.create(spec).await
    }
}

/// Checks shared by every backend before an upsert touches storage
#[inline]
pub fn validate_upsert(spec: &IndexSpec, records: &[IndexRecord]) -> Result<()> {
    if records.len() > MAX_UPSERT_BATCH {
        return Err(RagError::InvalidRequest(format!(
            "upsert of {} records exceeds the per-request limit of {}",
            records.len(),
            MAX_UPSERT_BATCH
        )));
    }
    if let Some(record) = records
        .iter()
        .find(|r| r.embedding.dimension() != spec.dimension)
    {
        return Err(RagError::DimensionMismatch {
            expected: spec.dimension,
            actual: record.embedding.dimension(),
        });
    }
    Ok(())
}

#[inline]
pub fn validate_query(spec: &IndexSpec, vector: &Embedding, top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::InvalidRequest("top_k must be positive".into()));
    }
    if vector.dimension() != spec.dimension {
        return Err(RagError::DimensionMismatch {
            expected: spec.dimension,
            actual: vector.dimension(),
        });
    }
    Ok(())
}

/// Reject a create call whose spec differs from the existing index
#[inline]
pub fn ensure_compatible(existing: &IndexSpec, requested: &IndexSpec) -> Result<()> {
    if existing.dimension != requested.dimension || existing.metric != requested.metric {
        return Err(RagError::IndexConflict(format!(
            "index '{}' exists with dimension {} and metric {}, requested dimension {} and metric {}; delete it explicitly to change",
            existing.name,
            existing.dimension,
            existing.metric,
            requested.dimension,
            requested.metric
        )));
    }
    Ok(())
}
