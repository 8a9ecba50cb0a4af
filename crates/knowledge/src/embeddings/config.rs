//! Embedding configuration.

use crate::error::{RagError, RagResult};
use serde::{Deserialize, Serialize};

/// Embedding settings, the `embedding:` section of `knowledge.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", "mock"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum texts per upstream request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Base URL override (e.g. `http://localhost:11434` or an OpenAI-compatible proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_dimensions() -> usize {
    3072
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    100
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            endpoint: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the mock provider.
    pub fn mock(dimensions: usize) -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> RagResult<()> {
        if self.dimensions == 0 {
            return Err(RagError::InvalidConfiguration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RagError::InvalidConfiguration(
                "embedding batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// API key from the configured environment variable.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
