
use arrow::record_batch::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{
    create_record_batch, create_schema, dedupe_last, distance_type, parse_record_batch,
    parse_search_batch, quote_literal, score_from_distance, spec_from_schema,
};
use crate::database::{
    IndexCatalog, IndexRecord, IndexSpec, Match, VectorIndex, ensure_compatible, validate_query,
    validate_upsert,
};
use crate::embeddings::Embedding;
use crate::{RagError, Result};

fn unavailable(action: &str, e: impl std::fmt::Display) -> RagError {
    RagError::IndexUnavailable(format!("{}: {}", action, e))
}

/// LanceDB database directory holding one table per index
#[derive(Clone)]
pub struct LanceCatalog {
    connection: Connection,
}

/// One LanceDB table used as a vector index
#[derive(Clone)]
pub struct LanceIndex {
    table: Table,
    spec: IndexSpec,
}

impl LanceCatalog {
    /// Connect to (creating if needed) the database directory at `db_path`
    #[inline]
    pub async fn connect(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::IndexUnavailable(format!(
                "failed to create vector database directory: {}",
                e
            ))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| unavailable("failed to connect to LanceDB", e))?;

        Ok(Self { connection })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| unavailable("failed to list tables", e))
    }

    async fn open_table(&self, name: &str) -> Result<(Table, IndexSpec)> {
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| unavailable("failed to open table", e))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| unavailable("failed to read table schema", e))?;

        let (spec, metric_recorded) = spec_from_schema(name, &schema)?;
        if !metric_recorded {
            warn!(
                "Table '{}' does not record a metric, assuming {}",
                name, spec.metric
            );
        }

        Ok((table, spec))
    }
}

#[async_trait]
impl IndexCatalog for LanceCatalog {
    type Index = LanceIndex;

    #[inline]
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.table_names().await?.iter().any(|n| n == name))
    }

    #[inline]
    async fn describe(&self, name: &str) -> Result<Option<IndexSpec>> {
        if !self.exists(name).await? {
            return Ok(None);
        }
        let (_, spec) = self.open_table(name).await?;
        Ok(Some(spec))
    }

    #[inline]
    async fn create(&self, spec: &IndexSpec) -> Result<LanceIndex> {
        if spec.dimension == 0 {
            return Err(RagError::InvalidRequest(
                "index dimension must be positive".into(),
            ));
        }

        if self.exists(&spec.name).await? {
            let (table, existing) = self.open_table(&spec.name).await?;
            ensure_compatible(&existing, spec)?;
            debug!("Index '{}' already exists with matching spec", spec.name);
            return Ok(LanceIndex {
                table,
                spec: existing,
            });
        }

        let table = self
            .connection
            .create_empty_table(&spec.name, create_schema(spec)?)
            .execute()
            .await
            .map_err(|e| unavailable("failed to create table", e))?;

        info!(
            "Created index '{}' with {} dimensions ({})",
            spec.name, spec.dimension, spec.metric
        );
        Ok(LanceIndex {
            table,
            spec: spec.clone(),
        })
    }

    #[inline]
    async fn open(&self, name: &str) -> Result<LanceIndex> {
        if !self.exists(name).await? {
            return Err(RagError::IndexNotFound(name.to_string()));
        }
        let (table, spec) = self.open_table(name).await?;
        Ok(LanceIndex { table, spec })
    }

    #[inline]
    async fn delete(&self, name: &str) -> Result<bool> {
        if !self.exists(name).await? {
            return Ok(false);
        }

        info!("Dropping index '{}'", name);
        self.connection
            .drop_table(name)
            .await
            .map_err(|e| unavailable("failed to drop table", e))?;
        Ok(true)
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    #[inline]
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    #[inline]
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        validate_upsert(&self.spec, records)?;
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }

        let unique = dedupe_last(records);
        let record_batch = create_record_batch(&self.spec, &unique)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| unavailable("failed to upsert records", e))?;

        debug!("Upserted {} records into '{}'", unique.len(), self.spec.name);
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &Embedding, top_k: usize) -> Result<Vec<Match>> {
        validate_query(&self.spec, vector, top_k)?;
        debug!("Searching '{}' with top_k {}", self.spec.name, top_k);

        let mut stream = self
            .table
            .vector_search(vector.as_slice())
            .map_err(|e| unavailable("failed to create vector search", e))?
            .column("vector")
            .distance_type(distance_type(self.spec.metric))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| unavailable("failed to execute search", e))?;

        let mut matches = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| unavailable("failed to read result stream", e))?
        {
            for (id, distance, metadata) in parse_search_batch(&batch)? {
                matches.push(Match {
                    id,
                    score: score_from_distance(self.spec.metric, distance),
                    metadata,
                });
            }
        }

        // Results arrive ordered by distance; keep that order for ties
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    #[inline]
    async fn fetch(&self, id: &str) -> Result<Option<IndexRecord>> {
        let mut stream = self
            .table
            .query()
            .only_if(format!("id = {}", quote_literal(id)))
            .limit(1)
            .execute()
            .await
            .map_err(|e| unavailable("failed to execute lookup", e))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| unavailable("failed to read lookup stream", e))?
        {
            if let Some(record) = parse_record_batch(&batch)?.into_iter().next() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| unavailable("failed to count rows", e))
    }
}
