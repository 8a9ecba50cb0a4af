//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{MockProvider, OllamaProvider, OpenAiProvider};
use crate::error::{RagError, RagResult};
use std::sync::Arc;

/// Text to dense vectors.
///
/// Every failure surfaces as `RagError::EmbeddingUnavailable`; providers do
/// not retry.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Embed a batch of documents, one vector per input in order.
    async fn embed_documents(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single query.
    async fn embed_query(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut results = self.embed_documents(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// `api_key` overrides the key read from `config.api_key_env`.
pub fn create_provider(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
) -> RagResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(config.dimensions))),

        "openai" => {
            let key = api_key
                .map(str::to_string)
                .or_else(|| config.api_key_from_env())
                .ok_or_else(|| {
                    RagError::InvalidConfiguration(format!(
                        "OpenAI embeddings need an API key (set {})",
                        config.api_key_env
                    ))
                })?;
            Ok(Arc::new(OpenAiProvider::new(config, key)?))
        }

        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),

        _ => Err(RagError::InvalidConfiguration(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, ollama, mock",
            config.provider
        ))),
    }
}

/// Scale a vector to unit length; zero vectors are left untouched.
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
