use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Vector index not found: {0}")]
    IndexNotFound(String),

    #[error("Vector index conflict: {0}")]
    IndexConflict(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(
        "Upload partially committed ({committed_batches}/{total_batches} batches): {source}"
    )]
    PartialUpload {
        committed_batches: usize,
        total_batches: usize,
        #[source]
        source: Box<RagError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Run a blocking backend call on tokio's blocking pool.
///
/// Embedders and generators speak blocking HTTP; calling them through this
/// keeps async callers usable on any runtime flavor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("blocking task failed: {}", e)))?
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod http;
pub mod indexer;
pub mod query;
