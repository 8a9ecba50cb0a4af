//! LanceDB-backed vector index implementation.

use crate::error::{RagError, RagResult};
use crate::types::{IndexRecord, QueryMatch, RecordFilter, RecordMetadata};
use crate::vector_index::VectorIndex;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// LanceDB-backed vector index for material chunks.
pub struct LanceDbIndex {
    table: Table,
    embedding_dim: usize,
}

fn index_err(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::IndexQueryFailed(format!("{}: {}", context, e))
}

impl LanceDbIndex {
    /// Create or open a LanceDB index at the specified path.
    ///
    /// # Arguments
    /// * `db_path` - Directory path for the LanceDB database
    /// * `table_name` - Collection name (see `DEFAULT_COLLECTION`)
    /// * `embedding_dim` - Dimension of embedding vectors
    pub async fn open(db_path: &Path, table_name: &str, embedding_dim: usize) -> RagResult<Self> {
        std::fs::create_dir_all(db_path)
            .map_err(|e| index_err("Failed to create index directory", e))?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| index_err("Failed to connect to LanceDB", e))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| index_err("Failed to list tables", e))?;

        let table = if table_names.iter().any(|name| name == table_name) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(|e| index_err("Failed to open table", e))?
        } else {
            conn.create_empty_table(table_name, Self::create_schema(embedding_dim))
                .execute()
                .await
                .map_err(|e| index_err("Failed to create table", e))?
        };

        tracing::debug!("Initialized LanceDB index at {:?}", db_path);

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("item_id", DataType::Utf8, false),
            Field::new("item_kind", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert records to a single Arrow RecordBatch.
    fn records_to_batch(&self, records: &[IndexRecord]) -> RagResult<RecordBatch> {
        let mut values = Vec::with_capacity(records.len() * self.embedding_dim);
        let mut metadata = Vec::with_capacity(records.len());

        for record in records {
            if record.embedding.len() != self.embedding_dim {
                return Err(RagError::IndexQueryFailed(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.embedding_dim,
                    record.embedding.len()
                )));
            }
            values.extend_from_slice(&record.embedding);
            metadata.push(
                serde_json::to_string(&record.metadata)
                    .map_err(|e| index_err("Failed to serialize metadata", e))?,
            );
        }

        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| index_err("Failed to build embedding column", e))?;

        let column = |f: fn(&IndexRecord) -> &str| {
            Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
        };

        RecordBatch::try_new(
            Self::create_schema(self.embedding_dim),
            vec![
                column(|r| r.record_id.as_str()),
                column(|r| r.metadata.source.as_str()),
                column(|r| r.metadata.item_id.as_str()),
                column(|r| r.metadata.item_kind.as_str()),
                column(|r| r.text.as_str()),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embedding_array),
            ],
        )
        .map_err(|e| index_err("Failed to create RecordBatch", e))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> RagResult<&'a StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| RagError::IndexQueryFailed(format!("Invalid {} column", name)))
    }

    /// Convert result batches to matches, nearest first.
    fn batches_to_matches(batches: &[RecordBatch]) -> RagResult<Vec<QueryMatch>> {
        let mut matches = Vec::new();

        for batch in batches {
            let ids = Self::string_column(batch, "id")?;
            let texts = Self::string_column(batch, "text")?;
            let metadata = Self::string_column(batch, "metadata")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| RagError::IndexQueryFailed("Missing _distance column".to_string()))?;

            for row in 0..batch.num_rows() {
                let record_metadata: RecordMetadata = serde_json::from_str(metadata.value(row))
                    .map_err(|e| index_err("Failed to parse metadata", e))?;
                matches.push(QueryMatch {
                    record_id: ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    metadata: record_metadata,
                    distance: distances.value(row),
                });
            }
        }

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matches)
    }
}

/// SQL predicate for a filter; `None` matches every row.
fn predicate(filter: &RecordFilter) -> Option<String> {
    match filter {
        RecordFilter::Any => None,
        RecordFilter::Source(source) => Some(format!("source = '{}'", escape(source))),
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> RagResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch = self.records_to_batch(records)?;

        let ids = records
            .iter()
            .map(|r| format!("'{}'", escape(&r.record_id)))
            .collect::<Vec<_>>()
            .join(", ");
        self.table
            .delete(&format!("id IN ({})", ids))
            .await
            .map_err(|e| index_err("Failed to replace records", e))?;

        let schema = batch.schema();
        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| index_err("Failed to add records", e))?;

        tracing::debug!("Batch inserted {} records into LanceDB", records.len());
        Ok(())
    }

    async fn delete(&self, filter: &RecordFilter) -> RagResult<usize> {
        let removed = self.count(filter).await?;
        if removed == 0 {
            return Ok(0);
        }

        let predicate = predicate(filter).unwrap_or_else(|| "id IS NOT NULL".to_string());
        self.table
            .delete(&predicate)
            .await
            .map_err(|e| index_err("Failed to delete records", e))?;

        tracing::debug!("Deleted {} records from LanceDB", removed);
        Ok(removed)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> RagResult<Vec<QueryMatch>> {
        if k == 0 || self.count(&RecordFilter::Any).await? == 0 {
            return Ok(Vec::new());
        }

        if embedding.len() != self.embedding_dim {
            return Err(RagError::IndexQueryFailed(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                embedding.len()
            )));
        }

        let batches = self
            .table
            .query()
            .nearest_to(embedding.to_vec())
            .map_err(|e| index_err("Failed to create query", e))?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| index_err("Failed to execute search", e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| index_err("Failed to collect results", e))?;

        let mut matches = Self::batches_to_matches(&batches)?;
        matches.truncate(k);

        tracing::debug!("Retrieved {} records (requested top-{})", matches.len(), k);
        Ok(matches)
    }

    async fn count(&self, filter: &RecordFilter) -> RagResult<usize> {
        self.table
            .count_rows(predicate(filter))
            .await
            .map_err(|e| index_err("Failed to count rows", e))
    }

    async fn sources(&self) -> RagResult<Vec<(String, usize)>> {
        let batches = self
            .table
            .query()
            .select(Select::columns(&["source"]))
            .execute()
            .await
            .map_err(|e| index_err("Failed to scan sources", e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| index_err("Failed to collect sources", e))?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for batch in &batches {
            let sources = Self::string_column(batch, "source")?;
            for row in 0..sources.len() {
                *counts.entry(sources.value(row).to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}
