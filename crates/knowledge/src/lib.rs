//! Retrieval over parsed study materials.
//!
//! Exam sheets are parsed into structural items, chunked, embedded and stored
//! in a local vector index; questions are answered from the nearest chunks.

pub mod builder;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod parser;
pub mod pdf;
pub mod progress;
pub mod query;
pub mod rag;
pub mod sources;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;

#[cfg(feature = "lancedb")]
pub mod lancedb_index;

#[cfg(test)]
mod tests;

pub use builder::IndexBuilder;
pub use chunker::{chunk, ChunkProfile};
pub use config::{IndexBackend, KnowledgeConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use error::{RagError, RagResult};
pub use progress::{ProgressEvent, ProgressReporter};
pub use query::{QueryEngine, DEFAULT_TOP_K};
pub use rag::{MaterialSelection, Retriever, Tutor, TutorAnswer};
pub use sources::SourceStore;
pub use types::{
    IndexRecord, IndexStats, ItemKind, QueryMatch, RecordFilter, SourceRecord, StructuralItem,
};
pub use vector_index::VectorIndex;

use std::path::Path;
use std::sync::Arc;

/// Open the configured vector index for a workspace.
pub async fn open_index(
    workspace: &Path,
    config: &KnowledgeConfig,
) -> RagResult<Arc<dyn VectorIndex>> {
    let path = config.index_path(workspace);

    match config.index.backend {
        IndexBackend::Sqlite => Ok(Arc::new(sqlite_index::SqliteIndex::open(&path)?)),

        #[cfg(feature = "lancedb")]
        IndexBackend::Lancedb => Ok(Arc::new(
            lancedb_index::LanceDbIndex::open(
                &path,
                &config.index.collection,
                config.embedding.dimensions,
            )
            .await?,
        )),

        #[cfg(not(feature = "lancedb"))]
        IndexBackend::Lancedb => Err(RagError::InvalidConfiguration(
            "The lancedb backend is not compiled in; rebuild with --features lancedb".to_string(),
        )),
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_default_index() {
        let temp = TempDir::new().unwrap();
        let index = open_index(temp.path(), &KnowledgeConfig::default())
            .await
            .unwrap();
        assert_eq!(index.backend_name(), "sqlite");
        assert!(temp.path().join(".tutor").join("index.sqlite").exists());
    }

    #[cfg(not(feature = "lancedb"))]
    #[tokio::test]
    async fn test_lancedb_without_feature() {
        let temp = TempDir::new().unwrap();
        let mut config = KnowledgeConfig::default();
        config.index.backend = IndexBackend::Lancedb;
        assert!(matches!(
            open_index(temp.path(), &config).await,
            Err(RagError::InvalidConfiguration(_))
        ));
    }
}
