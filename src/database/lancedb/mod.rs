// LanceDB vector database module
// Arrow schema and record conversion for LanceDB-backed indexes

#[cfg(test)]
mod tests;

pub mod vector_store;

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{IndexRecord, IndexSpec, Metadata, Metric};
use crate::embeddings::Embedding;
use crate::{RagError, Result};

pub use vector_store::{LanceCatalog, LanceIndex};

const ID_COLUMN: &str = "id";
const VECTOR_COLUMN: &str = "vector";
const METADATA_COLUMN: &str = "metadata";
const DISTANCE_COLUMN: &str = "_distance";
const METRIC_SCHEMA_KEY: &str = "rag_kit.metric";

/// Arrow list size for the vector column
fn list_size(spec: &IndexSpec) -> Result<i32> {
    i32::try_from(spec.dimension).map_err(|_| {
        RagError::InvalidRequest(format!(
            "index dimension {} exceeds the supported maximum of {}",
            spec.dimension,
            i32::MAX
        ))
    })
}

/// Table schema for an index with the given spec; the metric travels in
/// the schema metadata so it survives reopening the table.
fn create_schema(spec: &IndexSpec) -> Result<Arc<Schema>> {
    let fields = vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size(spec)?,
            ),
            false,
        ),
        Field::new(METADATA_COLUMN, DataType::Utf8, false),
    ];
    let metadata = HashMap::from([(
        METRIC_SCHEMA_KEY.to_string(),
        spec.metric.as_str().to_string(),
    )]);
    Ok(Arc::new(Schema::new_with_metadata(fields, metadata)))
}

/// Recover the index spec from a table schema. The flag is false when the
/// schema records no metric and the default was assumed.
fn spec_from_schema(name: &str, schema: &Schema) -> Result<(IndexSpec, bool)> {
    let dimension = schema
        .fields()
        .iter()
        .find(|field| field.name() == VECTOR_COLUMN)
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            RagError::IndexUnavailable(format!(
                "table '{}' has no fixed-size vector column",
                name
            ))
        })?;

    let stored_metric = schema
        .metadata()
        .get(METRIC_SCHEMA_KEY)
        .and_then(|m| m.parse::<Metric>().ok());

    Ok((
        IndexSpec::new(name, dimension, stored_metric.unwrap_or_default()),
        stored_metric.is_some(),
    ))
}

/// Keep the last occurrence of every id so a batch never carries duplicates
fn dedupe_last(records: &[IndexRecord]) -> Vec<&IndexRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique: Vec<&IndexRecord> = records
        .iter()
        .rev()
        .filter(|record| seen.insert(record.id.as_str()))
        .collect();
    unique.reverse();
    unique
}

fn create_record_batch(spec: &IndexSpec, records: &[&IndexRecord]) -> Result<RecordBatch> {
    let len = records.len();
    let vector_dim = spec.dimension;
    let size = list_size(spec)?;

    let mut ids = Vec::with_capacity(len);
    let mut metadata = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(record.embedding.as_slice());
        metadata.push(serde_json::to_string(&record.metadata).map_err(|e| {
            RagError::InvalidRequest(format!(
                "failed to encode metadata for '{}': {}",
                record.id, e
            ))
        })?);
    }

    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::InvalidRequest(format!("failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(metadata)),
    ];

    RecordBatch::try_new(create_schema(spec)?, arrays)
        .map_err(|e| RagError::InvalidRequest(format!("failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::IndexUnavailable(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::IndexUnavailable(format!("invalid {} column type", name)))
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| RagError::IndexUnavailable(format!("corrupt metadata column: {}", e)))
}

/// Rows of a vector search: id, distance and metadata
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<(String, f32, Metadata)>> {
    let ids = string_column(batch, ID_COLUMN)?;
    let metadata = string_column(batch, METADATA_COLUMN)?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    (0..batch.num_rows())
        .map(|row| {
            let distance = distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
            Ok((
                ids.value(row).to_string(),
                distance,
                parse_metadata(metadata.value(row))?,
            ))
        })
        .collect()
}

/// Full records, vectors included
fn parse_record_batch(batch: &RecordBatch) -> Result<Vec<IndexRecord>> {
    let ids = string_column(batch, ID_COLUMN)?;
    let metadata = string_column(batch, METADATA_COLUMN)?;
    let vectors = batch
        .column_by_name(VECTOR_COLUMN)
        .ok_or_else(|| RagError::IndexUnavailable("missing vector column".into()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| RagError::IndexUnavailable("invalid vector column type".into()))?;

    (0..batch.num_rows())
        .map(|row| {
            let values = vectors.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RagError::IndexUnavailable("invalid vector item type".into()))?;
            Ok(IndexRecord {
                id: ids.value(row).to_string(),
                embedding: Embedding::new(values.values().to_vec())
                    .map_err(|e| RagError::IndexUnavailable(e.to_string()))?,
                metadata: parse_metadata(metadata.value(row))?,
            })
        })
        .collect()
}

/// Convert a LanceDB distance into a similarity where higher is better,
/// matching [`Metric::similarity`].
fn score_from_distance(metric: Metric, distance: f32) -> f32 {
    match metric {
        // cosine distance is 1 - cos, dot distance is 1 - dot
        Metric::Cosine | Metric::DotProduct => 1.0 - distance,
        // squared L2
        Metric::Euclidean => -distance,
    }
}

fn distance_type(metric: Metric) -> lancedb::DistanceType {
    match metric {
        Metric::Cosine => lancedb::DistanceType::Cosine,
        Metric::Euclidean => lancedb::DistanceType::L2,
        Metric::DotProduct => lancedb::DistanceType::Dot,
    }
}

/// SQL string literal for a filter expression
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
