//! PDF text extraction.
//!
//! Produces one string per page, in page order.

use crate::error::{RagError, RagResult};
use std::path::Path;

/// Read a PDF and return its page texts in order.
pub async fn extract_pages(path: &Path) -> RagResult<Vec<String>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| RagError::Extraction {
        path: path.to_path_buf(),
        reason: format!("Failed to read file: {}", e),
    })?;

    let pages =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                reason: format!("Extraction task failed: {}", e),
            })?
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

    tracing::debug!(path = %path.display(), pages = pages.len(), "Extracted PDF text");
    Ok(pages)
}
