//! Index builder: record files -> chunks -> embeddings -> vector index.
//!
//! Rebuilds are always full. A source is cleared before its records are
//! written again, so stale chunks never survive a rebuild.

use crate::chunker::{chunk_record, ChunkProfile};
use crate::config::{ProfilesConfig, TimeoutsConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::progress::ProgressReporter;
use crate::sources::SourceStore;
use crate::types::{IndexRecord, RecordFilter, RecordMetadata, SourceRecord};
use crate::vector_index::VectorIndex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Item kind of records produced by the raw-page pipeline.
pub const PAGE_KIND: &str = "page";

/// Bound an embedding call; a timeout is an embedding failure.
pub(crate) async fn bounded_embed<T>(
    limit: Duration,
    call: impl Future<Output = RagResult<T>>,
) -> RagResult<T> {
    tokio::time::timeout(limit, call).await.map_err(|_| {
        RagError::EmbeddingUnavailable(format!("timed out after {}s", limit.as_secs_f64()))
    })?
}

/// Bound an index call; a timeout is an index failure.
pub(crate) async fn bounded_index<T>(
    limit: Duration,
    call: impl Future<Output = RagResult<T>>,
) -> RagResult<T> {
    tokio::time::timeout(limit, call).await.map_err(|_| {
        RagError::IndexQueryFailed(format!("timed out after {}s", limit.as_secs_f64()))
    })?
}

/// Builds the vector index from the parsed directory.
///
/// `rebuild_one` and `rebuild_raw_pages` share the global lock and hold a
/// per-source mutex; `rebuild_all` holds the global lock exclusively.
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: SourceStore,
    profiles: ProfilesConfig,
    timeouts: TimeoutsConfig,
    rebuild_lock: RwLock<()>,
    source_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    progress: ProgressReporter,
}

impl IndexBuilder {
    /// Fails with `InvalidConfiguration` if a chunk profile is unusable.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: SourceStore,
        profiles: ProfilesConfig,
        timeouts: TimeoutsConfig,
    ) -> RagResult<Self> {
        profiles.structured.validate()?;
        profiles.raw_page.validate()?;

        Ok(Self {
            embedder,
            index,
            store,
            profiles,
            timeouts,
            rebuild_lock: RwLock::new(()),
            source_locks: Mutex::new(HashMap::new()),
            progress: ProgressReporter::noop(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &SourceStore {
        &self.store
    }

    /// Replace the records of one source, returning how many were written.
    pub async fn rebuild_one(&self, source_name: &str) -> RagResult<usize> {
        let start = Instant::now();
        let name = self.store.resolve_name(source_name)?;

        let _shared = self.rebuild_lock.read().await;
        let source_lock = self.source_lock(&name).await;
        let _exclusive = source_lock.lock().await;

        let records = self.store.load(&name)?;
        self.progress.load(&name, records.len());

        let removed = self.delete(RecordFilter::Source(name.clone())).await?;
        let written = self
            .index_records(&name, &records, &self.profiles.structured)
            .await?;

        tracing::info!(
            source = %name,
            removed,
            written,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Rebuilt source"
        );
        Ok(written)
    }

    /// Rebuild every record file in the parsed directory.
    ///
    /// All files are loaded before the index is cleared, so a malformed file
    /// leaves the index untouched.
    pub async fn rebuild_all(&self) -> RagResult<usize> {
        let start = Instant::now();
        let _exclusive = self.rebuild_lock.write().await;

        let names = self.store.list_sources()?;
        if names.is_empty() {
            return Err(RagError::NoSourcesAvailable {
                dir: self.store.parsed_dir().to_path_buf(),
            });
        }

        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            let records = self.store.load(&name)?;
            self.progress.load(&name, records.len());
            loaded.push((name, records));
        }

        let removed = self.delete(RecordFilter::Any).await?;

        let mut total = 0;
        for (name, records) in &loaded {
            total += self
                .index_records(name, records, &self.profiles.structured)
                .await?;
        }

        tracing::info!(
            sources = loaded.len(),
            removed,
            written = total,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Rebuilt index"
        );
        Ok(total)
    }

    /// Index page texts of a document directly, one record per page.
    ///
    /// Pages are numbered from 1; blank pages produce no records.
    pub async fn rebuild_raw_pages(&self, source_name: &str, pages: &[String]) -> RagResult<usize> {
        let start = Instant::now();

        let _shared = self.rebuild_lock.read().await;
        let source_lock = self.source_lock(source_name).await;
        let _exclusive = source_lock.lock().await;

        let records: Vec<SourceRecord> = pages
            .iter()
            .enumerate()
            .map(|(i, page)| SourceRecord {
                id: format!("{}#p{}", source_name, i + 1),
                kind: PAGE_KIND.to_string(),
                content: page.clone(),
            })
            .collect();
        self.progress.load(source_name, records.len());

        self.delete(RecordFilter::Source(source_name.to_string()))
            .await?;
        let written = self
            .index_records(source_name, &records, &self.profiles.raw_page)
            .await?;

        tracing::info!(
            source = %source_name,
            pages = pages.len(),
            written,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Indexed raw pages"
        );
        Ok(written)
    }

    async fn source_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.source_locks.lock().await;
        locks.entry(name.to_string()).or_default().clone()
    }

    async fn delete(&self, filter: RecordFilter) -> RagResult<usize> {
        bounded_index(self.timeouts.index(), self.index.delete(&filter)).await
    }

    /// Chunk, embed and write the records of one source.
    async fn index_records(
        &self,
        source: &str,
        records: &[SourceRecord],
        profile: &ChunkProfile,
    ) -> RagResult<usize> {
        let mut chunks = Vec::new();
        for record in records {
            if record.content.trim().is_empty() {
                tracing::debug!(source, item = %record.id, "Skipping blank record");
                continue;
            }
            for chunk in chunk_record(&record.id, &record.content, profile)? {
                chunks.push((record, chunk));
            }
        }
        self.progress.chunk(source, chunks.len());

        if chunks.is_empty() {
            tracing::warn!(source, "No content to index");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|(_, c)| c.text.clone()).collect();
        let embeddings = bounded_embed(
            self.timeouts.embed(),
            self.embedder.embed_documents(&texts),
        )
        .await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        self.progress
            .embed(source, embeddings.len(), self.embedder.model_name());

        let index_records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(n, ((record, chunk), embedding))| IndexRecord {
                record_id: format!("{}-{}", source, n),
                embedding,
                metadata: RecordMetadata {
                    source: source.to_string(),
                    item_id: record.id.clone(),
                    item_kind: record.kind.clone(),
                    chunk_index: chunk.sequence_index,
                    content_hash: content_hash(&chunk.text),
                },
                text: chunk.text,
            })
            .collect();

        bounded_index(self.timeouts.index(), self.index.upsert(&index_records)).await?;
        self.progress
            .index(source, index_records.len(), self.index.backend_name());

        Ok(index_records.len())
    }
}

/// SHA-256 of the chunk text, hex encoded.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::MockProvider;
    use crate::sqlite_index::SqliteIndex;

    fn builder(profiles: ProfilesConfig) -> RagResult<IndexBuilder> {
        IndexBuilder::new(
            Arc::new(MockProvider::new(64)),
            Arc::new(SqliteIndex::open_in_memory()?),
            SourceStore::new("parsed"),
            profiles,
            TimeoutsConfig::default(),
        )
    }

    #[test]
    fn test_invalid_profile_rejected_at_construction() {
        let profiles = ProfilesConfig {
            structured: ChunkProfile {
                window_size: 100,
                overlap: 100,
            },
            ..Default::default()
        };
        assert!(matches!(
            builder(profiles),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        let hash = content_hash("Zadanie 1");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("Zadanie 1"));
        assert_ne!(hash, content_hash("Zadanie 2"));
    }

    #[tokio::test]
    async fn test_raw_pages_records_carry_page_ids() {
        let builder = builder(ProfilesConfig::default()).unwrap();
        let pages = vec![
            "Strona pierwsza o kwasach.".to_string(),
            "   ".to_string(),
            "Strona trzecia o zasadach.".to_string(),
        ];

        let written = builder
            .rebuild_raw_pages("arkusz.pdf", &pages)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let hits = builder.index.query(&[0.0; 64], 10).await.unwrap();
        let mut item_ids: Vec<_> = hits.iter().map(|h| h.metadata.item_id.clone()).collect();
        item_ids.sort();
        assert_eq!(item_ids, vec!["arkusz.pdf#p1", "arkusz.pdf#p3"]);
        assert!(hits.iter().all(|h| h.metadata.item_kind == PAGE_KIND));
    }

    #[tokio::test]
    async fn test_bounded_calls_map_timeouts() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, RagError>(())
        };
        assert!(matches!(
            bounded_embed(Duration::from_millis(10), slow).await,
            Err(RagError::EmbeddingUnavailable(_))
        ));

        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, RagError>(())
        };
        assert!(matches!(
            bounded_index(Duration::from_millis(10), slow).await,
            Err(RagError::IndexQueryFailed(_))
        ));
    }
}
