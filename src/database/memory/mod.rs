// In-process vector index
// Exact nearest-neighbour search, used for tests and ephemeral workloads

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    IndexCatalog, IndexRecord, IndexSpec, Match, VectorIndex, ensure_compatible, validate_query,
    validate_upsert,
};
use crate::embeddings::Embedding;
use crate::{RagError, Result};

#[derive(Debug, Default)]
struct Store {
    records: Vec<IndexRecord>,
    positions: HashMap<String, usize>,
}

/// Handle to one in-memory index. Clones share the same records.
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    spec: IndexSpec,
    store: Arc<RwLock<Store>>,
}

/// Named in-memory indexes
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    indexes: Arc<RwLock<HashMap<String, MemoryIndex>>>,
}

impl MemoryIndex {
    /// Standalone index not registered in any catalog
    #[inline]
    pub fn detached(spec: IndexSpec) -> Self {
        Self {
            spec,
            store: Arc::default(),
        }
    }
}

impl MemoryCatalog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    #[inline]
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    #[inline]
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        validate_upsert(&self.spec, records)?;

        let mut store = self.store.write().await;
        for record in records {
            match store.positions.get(&record.id).copied() {
                Some(pos) => store.records[pos] = record.clone(),
                None => {
                    let pos = store.records.len();
                    store.positions.insert(record.id.clone(), pos);
                    store.records.push(record.clone());
                }
            }
        }

        debug!("Upserted {} records into '{}'", records.len(), self.spec.name);
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &Embedding, top_k: usize) -> Result<Vec<Match>> {
        validate_query(&self.spec, vector, top_k)?;

        let store = self.store.read().await;
        let mut scored: Vec<(f32, &IndexRecord)> = store
            .records
            .iter()
            .map(|record| {
                let score = self
                    .spec
                    .metric
                    .similarity(vector.as_slice(), record.embedding.as_slice());
                (score, record)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| Match {
                id: record.id.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    #[inline]
    async fn fetch(&self, id: &str) -> Result<Option<IndexRecord>> {
        let store = self.store.read().await;
        Ok(store
            .positions
            .get(id)
            .map(|&pos| store.records[pos].clone()))
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        Ok(self.store.read().await.records.len())
    }
}

#[async_trait]
impl IndexCatalog for MemoryCatalog {
    type Index = MemoryIndex;

    #[inline]
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(name))
    }

    #[inline]
    async fn describe(&self, name: &str) -> Result<Option<IndexSpec>> {
        Ok(self
            .indexes
            .read()
            .await
            .get(name)
            .map(|index| index.spec.clone()))
    }

    #[inline]
    async fn create(&self, spec: &IndexSpec) -> Result<MemoryIndex> {
        if spec.dimension == 0 {
            return Err(RagError::InvalidRequest(
                "index dimension must be positive".into(),
            ));
        }

        let mut indexes = self.indexes.write().await;
        if let Some(existing) = indexes.get(&spec.name) {
            ensure_compatible(&existing.spec, spec)?;
            return Ok(existing.clone());
        }

        let index = MemoryIndex::detached(spec.clone());
        indexes.insert(spec.name.clone(), index.clone());
        info!(
            "Created in-memory index '{}' ({} dimensions, {})",
            spec.name, spec.dimension, spec.metric
        );
        Ok(index)
    }

    #[inline]
    async fn open(&self, name: &str) -> Result<MemoryIndex> {
        self.indexes
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RagError::IndexNotFound(name.to_string()))
    }

    #[inline]
    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.indexes.write().await.remove(name);
        if removed.is_some() {
            info!("Deleted in-memory index '{}'", name);
        }
        Ok(removed.is_some())
    }
}
