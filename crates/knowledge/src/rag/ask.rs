//! Retrieval and answer generation.

use crate::config::RetrievalConfig;
use crate::error::{RagError, RagResult};
use crate::query::QueryEngine;
use crate::rag::prompt::{PromptRenderer, SYSTEM_PROMPT};
use crate::rag::session::MaterialSelection;
use serde::Serialize;
use std::sync::Arc;
use tutor_llm::{LlmClient, LlmRequest};

/// Answer given when retrieval finds nothing.
pub const NOT_FOUND_ANSWER: &str = "Nie znalazłam w tym materiale odpowiedzi na to pytanie. \
Spróbuj doprecyzować albo zapytaj o inny fragment.";

/// Requests a few matches and keeps the best of them.
pub struct Retriever {
    engine: Arc<QueryEngine>,
    request: usize,
    keep: usize,
}

impl Retriever {
    pub fn new(engine: Arc<QueryEngine>, config: RetrievalConfig) -> Self {
        Self {
            engine,
            request: config.request,
            keep: config.keep,
        }
    }

    /// Chunk texts for a question, nearest first. Errors propagate.
    pub async fn retrieve(&self, question: &str) -> RagResult<Vec<String>> {
        let mut chunks = self.engine.query(question, self.request).await?;
        chunks.truncate(self.keep);
        Ok(chunks)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TutorAnswer {
    pub answer: String,

    /// Chunks the answer was grounded on
    pub sources: Vec<String>,
}

/// Answers student questions over the indexed materials.
pub struct Tutor {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
    prompts: PromptRenderer,
    model: String,
    temperature: f32,
}

impl Tutor {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        temperature: f32,
    ) -> RagResult<Self> {
        Ok(Self {
            retriever,
            llm,
            prompts: PromptRenderer::new()?,
            model: model.into(),
            temperature,
        })
    }

    pub async fn ask(&self, selection: &MaterialSelection, question: &str) -> RagResult<TutorAnswer> {
        let material = selection.require()?;
        tracing::info!(material, "Answering question");

        let chunks = self.retriever.retrieve(question).await?;
        if chunks.is_empty() {
            tracing::info!(material, "No matching fragments");
            return Ok(TutorAnswer {
                answer: NOT_FOUND_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = self.prompts.render(question, &chunks)?;
        let request = LlmRequest::new(prompt, &self.model)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.temperature);

        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| RagError::AnswerGenerationFailed(e.to_string()))?;

        tracing::debug!(
            provider = self.llm.provider_name(),
            sources = chunks.len(),
            completion_tokens = response.usage.completion_tokens,
            "Answer generated"
        );

        Ok(TutorAnswer {
            answer: response.content.trim().to_string(),
            sources: chunks,
        })
    }
}
