//! Concrete LLM providers.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Shared request timeout for provider HTTP clients.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 120;
