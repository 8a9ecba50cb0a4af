//! Deterministic offline embeddings built from hashed character trigrams.

use crate::embeddings::provider::{normalize, EmbeddingProvider};
use crate::error::RagResult;
use std::collections::{HashMap, HashSet};

/// Words too common in exam sheets to help ranking.
const STOP_WORDS: &[&str] = &[
    // Polish
    "i", "w", "z", "na", "do", "się", "że", "to", "jest", "nie", "od", "po", "za", "o", "dla",
    "oraz", "lub", "czy", "jak", "ten", "ta", "te", "tym", "które", "który", "która", "są", "by",
    // English
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "for", "of", "in", "and",
    "or", "with", "by", "from", "this", "that", "it",
];

/// Mock provider for tests and offline use.
///
/// Vectors are content-dependent and stable across runs: texts sharing
/// words land close to each other, which is enough to exercise ranking.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for trigram in chars.windows(3) {
                let hash = trigram
                    .iter()
                    .fold(0u64, |acc, c| acc.wrapping_mul(37).wrapping_add(*c as u64));
                embedding[(hash as usize) % self.dimensions] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash as usize) % self.dimensions] += *freq as f32;
        }

        normalize(&mut embedding);
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
