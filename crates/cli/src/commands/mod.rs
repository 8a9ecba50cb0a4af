//! Command handlers for the tutor CLI.

pub mod materials;
pub mod rag;

pub use materials::MaterialsCommand;
pub use rag::RagCommand;

use std::sync::Arc;
use tutor_core::{config::AppConfig, AppResult};
use tutor_knowledge::config::load_config;
use tutor_knowledge::{
    create_provider, open_index, EmbeddingProvider, KnowledgeConfig, SourceStore, VectorIndex,
};

/// Knowledge components wired from the workspace configuration.
pub struct KnowledgeContext {
    pub config: KnowledgeConfig,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub store: SourceStore,
}

impl KnowledgeContext {
    pub async fn open(app: &AppConfig) -> AppResult<Self> {
        let config = load_config(&app.workspace)?;

        // An explicit TUTOR_API_KEY also serves OpenAI embeddings.
        let api_key = match config.embedding.provider.as_str() {
            "openai" => config
                .embedding
                .api_key_from_env()
                .or_else(|| app.resolve_api_key("openai")),
            _ => None,
        };
        let embedder = create_provider(&config.embedding, api_key.as_deref())?;
        let index = open_index(&app.workspace, &config).await?;
        let store = SourceStore::new(config.parsed_dir(&app.workspace));

        tracing::debug!(
            embedding = embedder.provider_name(),
            model = embedder.model_name(),
            backend = index.backend_name(),
            "Knowledge context ready"
        );

        Ok(Self {
            config,
            embedder,
            index,
            store,
        })
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
