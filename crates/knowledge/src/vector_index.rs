//! Vector index abstraction.
//!
//! Defines a trait for backend-agnostic storage of embedded chunks and
//! nearest-neighbour retrieval.

use crate::error::RagResult;
use crate::types::{IndexRecord, QueryMatch, RecordFilter};

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting records by `record_id`
/// - Deleting by filter
/// - Top-k query ordered by ascending distance (cosine distance)
/// - Counting by filter
///
/// All failures surface as `RagError::IndexQueryFailed`.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend identifier ("sqlite", "lancedb").
    fn backend_name(&self) -> &str;

    /// Insert records, replacing any with the same `record_id`.
    async fn upsert(&self, records: &[IndexRecord]) -> RagResult<()>;

    /// Remove matching records, returning how many were removed.
    async fn delete(&self, filter: &RecordFilter) -> RagResult<usize>;

    /// Up to `k` records nearest to `embedding`, nearest first.
    async fn query(&self, embedding: &[f32], k: usize) -> RagResult<Vec<QueryMatch>>;

    /// Number of matching records.
    async fn count(&self, filter: &RecordFilter) -> RagResult<usize>;

    /// Distinct `metadata.source` values with their record counts.
    async fn sources(&self) -> RagResult<Vec<(String, usize)>>;
}

/// Cosine distance (`1 - cosine similarity`); mismatched or zero vectors are at distance 1.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot_product / (norm_a * norm_b)
}
