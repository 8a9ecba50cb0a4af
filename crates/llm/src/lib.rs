//! LLM integration crate for the tutor backend.
//!
//! This crate provides a provider-agnostic abstraction for generating
//! answers with Large Language Models behind a single `LlmClient` trait.
//!
//! # Providers
//! - **OpenAI**: `/chat/completions` (default for answers)
//! - **Ollama**: local runtime via `/api/generate`
//!
//! # Example
//! ```no_run
//! use tutor_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Co to jest mol?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
