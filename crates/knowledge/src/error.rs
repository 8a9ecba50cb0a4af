//! Error taxonomy for the RAG indexing and retrieval core.

use std::path::PathBuf;
use thiserror::Error;
use tutor_core::AppError;

/// Errors raised by parsing, indexing and retrieval.
///
/// Empty results are never errors: an empty index or a blank source yields
/// an empty collection or a zero count.
#[derive(Error, Debug)]
pub enum RagError {
    /// A full rebuild was requested but the parsed directory holds no record files.
    #[error("No source files available in {}", dir.display())]
    NoSourcesAvailable { dir: PathBuf },

    /// A single-source rebuild named a record file that does not exist.
    #[error("Source not found: {name}")]
    SourceNotFound { name: String },

    /// Chunk window/overlap or another setting is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding capability failed or timed out.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The vector index failed or timed out.
    #[error("Index query failed: {0}")]
    IndexQueryFailed(String),

    /// A record file exists but does not match the `[{id, type, content}]` schema.
    #[error("Invalid source file {}: {reason}", path.display())]
    InvalidSourceFile { path: PathBuf, reason: String },

    /// Text could not be extracted from a PDF.
    #[error("Failed to extract text from {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// `ask` was called without an active material.
    #[error("No active material selected")]
    NoActiveMaterial,

    /// The answer-generation call failed.
    #[error("Answer generation failed: {0}")]
    AnswerGenerationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the knowledge crate.
pub type RagResult<T> = Result<T, RagError>;

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Io(io) => AppError::Io(io),
            other => AppError::Knowledge(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = RagError::SourceNotFound {
            name: "arkusz.json".to_string(),
        };
        assert_eq!(err.to_string(), "Source not found: arkusz.json");

        let err = RagError::NoSourcesAvailable {
            dir: PathBuf::from("parsed"),
        };
        assert!(err.to_string().contains("parsed"));
    }

    #[test]
    fn test_converts_into_app_error() {
        let app: AppError = RagError::NoActiveMaterial.into();
        assert!(matches!(app, AppError::Knowledge(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let app: AppError = RagError::Io(io).into();
        assert!(matches!(app, AppError::Io(_)));
    }
}
