// Indexer module
// Upload pipeline: segment sources, embed segments, upsert in bounded batches

pub mod segments;


use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info};

use crate::database::{IndexRecord, MAX_UPSERT_BATCH, Metadata, TEXT_KEY, TYPE_KEY, VectorIndex};
use crate::embeddings::Embedder;
use crate::{RagError, Result, run_blocking};

pub use segments::{Segment, segment_text};

/// Metadata key holding a segment's position within its source
pub const ORDINAL_KEY: &str = "ordinal";

/// A source file tagged with its type, e.g. `faq=./faq.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_type: String,
    pub path: PathBuf,
}

impl SourceDocument {
    #[inline]
    pub fn new(source_type: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            source_type: source_type.into(),
            path: path.into(),
        }
    }
}

impl FromStr for SourceDocument {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        let (source_type, path) = s.split_once('=').ok_or_else(|| {
            RagError::Config(format!("expected <type>=<path>, got '{}'", s))
        })?;
        validate_source_type(source_type)?;
        if path.trim().is_empty() {
            return Err(RagError::Config(format!("missing path for source '{}'", s)));
        }
        Ok(Self::new(source_type, path))
    }
}

/// Source types become id prefixes, so keep them free of separators
#[inline]
pub fn validate_source_type(source_type: &str) -> Result<()> {
    let valid = !source_type.is_empty()
        && source_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RagError::Config(format!(
            "invalid source type '{}' (use letters, digits, '-' or '_')",
            source_type
        )))
    }
}

/// Counters reported after an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub sources: usize,
    pub segments: usize,
    pub records_upserted: usize,
    pub batches_committed: usize,
}

/// Segments sources, embeds every segment and upserts the records.
///
/// Embedding is atomic per source: a failed source aborts the upload before
/// anything is written. Upserts are committed batch by batch, so a failure
/// after the first batch leaves earlier batches in the index and is reported
/// as [`RagError::PartialUpload`].
pub struct UploadPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl UploadPipeline {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            batch_size: MAX_UPSERT_BATCH,
        }
    }

    /// Records per upsert call, clamped to `1..=MAX_UPSERT_BATCH`
    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_UPSERT_BATCH);
        self
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read, segment, embed and upsert every source
    #[inline]
    pub async fn upload_sources(&self, sources: &[SourceDocument]) -> Result<UploadStats> {
        let mut seen = HashSet::new();
        for source in sources {
            validate_source_type(&source.source_type)?;
            if !seen.insert(source.source_type.as_str()) {
                return Err(RagError::Config(format!(
                    "source type '{}' given more than once",
                    source.source_type
                )));
            }
        }

        let mut segmented = Vec::with_capacity(sources.len());
        for source in sources {
            let raw = fs::read_to_string(&source.path).await.map_err(|e| {
                error!("Failed to read source {}: {}", source.path.display(), e);
                e
            })?;
            let segments = segment_text(&source.source_type, &raw);
            info!(
                "Read {} segments of type '{}' from {}",
                segments.len(),
                source.source_type,
                source.path.display()
            );
            segmented.push(segments);
        }

        self.upload_segments(segmented).await
    }

    /// Segment, embed and upsert text already in memory
    #[inline]
    pub async fn upload_text(&self, source_type: &str, raw: &str) -> Result<UploadStats> {
        validate_source_type(source_type)?;
        self.upload_segments(vec![segment_text(source_type, raw)])
            .await
    }

    async fn upload_segments(&self, sources: Vec<Vec<Segment>>) -> Result<UploadStats> {
        let total_segments: usize = sources.iter().map(Vec::len).sum();
        let mut stats = UploadStats {
            sources: sources.len(),
            segments: total_segments,
            ..UploadStats::default()
        };

        let bar = progress_bar(total_segments as u64, "Embedding");

        let mut records = Vec::with_capacity(total_segments);
        for segments in sources {
            if segments.is_empty() {
                continue;
            }
            let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
            let embedder = Arc::clone(&self.embedder);
            let embeddings = run_blocking(move || embedder.embed_many(&texts)).await?;
            if embeddings.len() != segments.len() {
                return Err(RagError::Embedding(format!(
                    "embedder returned {} vectors for {} segments",
                    embeddings.len(),
                    segments.len()
                )));
            }

            records.extend(segments.into_iter().zip(embeddings).map(|(segment, embedding)| {
                IndexRecord {
                    id: segment.id(),
                    embedding,
                    metadata: segment_metadata(segment),
                }
            }));
            bar.set_position(records.len() as u64);
        }
        bar.finish_and_clear();

        // Refuse before the first batch so a wrong model never half-fills the index
        let expected = self.index.spec().dimension;
        if let Some(record) = records
            .iter()
            .find(|r| r.embedding.dimension() != expected)
        {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: record.embedding.dimension(),
            });
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        let bar = progress_bar(total_batches as u64, "Upserting");

        for batch in records.chunks(self.batch_size) {
            if let Err(e) = self.index.upsert(batch).await {
                bar.abandon();
                error!(
                    "Upsert failed after {}/{} batches: {}",
                    stats.batches_committed, total_batches, e
                );
                if stats.batches_committed == 0 {
                    return Err(e);
                }
                return Err(RagError::PartialUpload {
                    committed_batches: stats.batches_committed,
                    total_batches,
                    source: Box::new(e),
                });
            }
            stats.batches_committed += 1;
            stats.records_upserted += batch.len();
            bar.inc(1);
            debug!(
                "Committed batch {}/{} ({} records)",
                stats.batches_committed,
                total_batches,
                batch.len()
            );
        }
        bar.finish_and_clear();

        info!(
            "Uploaded {} records from {} sources in {} batches",
            stats.records_upserted, stats.sources, stats.batches_committed
        );
        Ok(stats)
    }
}

fn segment_metadata(segment: Segment) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(ORDINAL_KEY.to_string(), segment.ordinal.to_string());
    metadata.insert(TYPE_KEY.to_string(), segment.source_type);
    metadata.insert(TEXT_KEY.to_string(), segment.text);
    metadata
}

fn progress_bar(length: u64, action: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(length).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(action.to_string());
    bar
}
