//! Embedding providers.
//!
//! A single provider is built once from configuration by `create_provider`
//! and shared (`Arc<dyn EmbeddingProvider>`) by the builder and the query
//! engine.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
