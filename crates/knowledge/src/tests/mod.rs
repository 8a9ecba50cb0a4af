//! Integration tests for the rebuild and retrieval paths.

mod ranking;

use crate::builder::IndexBuilder;
use crate::config::{ProfilesConfig, TimeoutsConfig};
use crate::embeddings::providers::MockProvider;
use crate::embeddings::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::query::QueryEngine;
use crate::sources::SourceStore;
use crate::sqlite_index::SqliteIndex;
use crate::types::{IndexRecord, QueryMatch, RecordFilter, SourceRecord};
use crate::vector_index::VectorIndex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) const DIMENSIONS: usize = 256;

/// Builder, engine and index sharing one on-disk workspace.
pub(crate) struct Harness {
    pub _temp: TempDir,
    pub parsed_dir: std::path::PathBuf,
    pub index: Arc<SqliteIndex>,
    pub builder: IndexBuilder,
    pub engine: Arc<QueryEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(MockProvider::new(DIMENSIONS)))
    }

    pub fn with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let temp = TempDir::new().unwrap();
        let parsed_dir = temp.path().join("parsed");
        std::fs::create_dir_all(&parsed_dir).unwrap();

        let index = Arc::new(SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap());
        let builder = IndexBuilder::new(
            embedder.clone(),
            index.clone(),
            SourceStore::new(&parsed_dir),
            ProfilesConfig::default(),
            TimeoutsConfig::default(),
        )
        .unwrap();
        let engine = Arc::new(QueryEngine::new(
            embedder,
            index.clone(),
            TimeoutsConfig::default(),
        ));

        Self {
            _temp: temp,
            parsed_dir,
            index,
            builder,
            engine,
        }
    }

    /// Write `<parsed>/<name>` with the given `(id, content)` records.
    pub fn write_source(&self, name: &str, records: &[(&str, &str)]) {
        write_records(&self.parsed_dir, name, records);
    }

    pub fn write_raw(&self, name: &str, content: &str) {
        std::fs::write(self.parsed_dir.join(name), content).unwrap();
    }

    pub async fn count(&self) -> usize {
        self.index
            .count(&crate::types::RecordFilter::Any)
            .await
            .unwrap()
    }

    pub async fn count_source(&self, source: &str) -> usize {
        self.index
            .count(&crate::types::RecordFilter::Source(source.to_string()))
            .await
            .unwrap()
    }
}

pub(crate) fn write_records(dir: &Path, name: &str, records: &[(&str, &str)]) {
    let records: Vec<SourceRecord> = records
        .iter()
        .map(|(id, content)| SourceRecord {
            id: id.to_string(),
            kind: "task".to_string(),
            content: content.to_string(),
        })
        .collect();
    std::fs::write(dir.join(name), serde_json::to_string(&records).unwrap()).unwrap();
}

/// Embedding provider that always fails.
#[derive(Debug)]
pub(crate) struct FailingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for FailingProvider {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_documents(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Vector index whose reads and inserts fail. Deletes succeed so a rebuild
/// reaches the insert.
#[derive(Debug)]
pub(crate) struct FailingIndex;

#[async_trait::async_trait]
impl VectorIndex for FailingIndex {
    fn backend_name(&self) -> &str {
        "failing"
    }

    async fn upsert(&self, _records: &[IndexRecord]) -> RagResult<()> {
        Err(RagError::IndexQueryFailed("disk I/O error".to_string()))
    }

    async fn delete(&self, _filter: &RecordFilter) -> RagResult<usize> {
        Ok(0)
    }

    async fn query(&self, _embedding: &[f32], _k: usize) -> RagResult<Vec<QueryMatch>> {
        Err(RagError::IndexQueryFailed("disk I/O error".to_string()))
    }

    async fn count(&self, _filter: &RecordFilter) -> RagResult<usize> {
        Err(RagError::IndexQueryFailed("disk I/O error".to_string()))
    }

    async fn sources(&self) -> RagResult<Vec<(String, usize)>> {
        Err(RagError::IndexQueryFailed("disk I/O error".to_string()))
    }
}

/// Builder and engine over a failing index, reading sources from `parsed_dir`.
pub(crate) fn failing_index_pipeline(parsed_dir: &Path) -> (IndexBuilder, QueryEngine) {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockProvider::new(DIMENSIONS));
    let index: Arc<dyn VectorIndex> = Arc::new(FailingIndex);
    let builder = IndexBuilder::new(
        embedder.clone(),
        index.clone(),
        SourceStore::new(parsed_dir),
        ProfilesConfig::default(),
        TimeoutsConfig::default(),
    )
    .unwrap();
    let engine = QueryEngine::new(embedder, index, TimeoutsConfig::default());
    (builder, engine)
}
