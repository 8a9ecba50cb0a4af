//! Query engine: question -> embedding -> nearest chunks.

use crate::builder::{bounded_embed, bounded_index};
use crate::config::TimeoutsConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::RagResult;
use crate::types::{IndexStats, QueryMatch, RecordFilter, SourceStats};
use crate::vector_index::VectorIndex;
use std::sync::Arc;

/// Default number of matches returned by `query`.
pub const DEFAULT_TOP_K: usize = 5;

/// Read path over the vector index. Takes no locks.
pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    timeouts: TimeoutsConfig,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            timeouts,
        }
    }

    /// Matched chunk texts, nearest first.
    pub async fn query(&self, question: &str, top_k: usize) -> RagResult<Vec<String>> {
        Ok(self
            .query_matches(question, top_k)
            .await?
            .into_iter()
            .map(|m| m.text)
            .collect())
    }

    /// Full matches (text, metadata, distance), nearest first.
    ///
    /// An empty index yields an empty result; provider and index failures
    /// are errors, never empty results.
    pub async fn query_matches(&self, question: &str, top_k: usize) -> RagResult<Vec<QueryMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = bounded_embed(self.timeouts.embed(), self.embedder.embed_query(question))
            .await?;
        let mut matches =
            bounded_index(self.timeouts.index(), self.index.query(&embedding, top_k)).await?;
        matches.truncate(top_k);

        tracing::debug!(
            top_k,
            matches = matches.len(),
            best_distance = ?matches.first().map(|m| m.distance),
            "Query completed"
        );
        Ok(matches)
    }

    /// Record counts for the whole index and per source.
    pub async fn stats(&self) -> RagResult<IndexStats> {
        let records =
            bounded_index(self.timeouts.index(), self.index.count(&RecordFilter::Any)).await?;
        let sources = bounded_index(self.timeouts.index(), self.index.sources())
            .await?
            .into_iter()
            .map(|(source, records)| SourceStats { source, records })
            .collect();

        Ok(IndexStats {
            backend: self.index.backend_name().to_string(),
            records,
            sources,
        })
    }
}
