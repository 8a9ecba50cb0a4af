//! SQLite-backed vector index with exact cosine search.

use crate::error::{RagError, RagResult};
use crate::types::{IndexRecord, QueryMatch, RecordFilter, RecordMetadata};
use crate::vector_index::{cosine_distance, VectorIndex};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Vector index stored in a single SQLite table.
///
/// Calls run on the blocking pool so the caller's timeout can fire while
/// SQLite works.
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
}

fn index_err(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::IndexQueryFailed(format!("{}: {}", context, e))
}

impl SqliteIndex {
    /// Open (or create) the index database at `db_path`.
    pub fn open(db_path: &Path) -> RagResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| index_err("Failed to create index directory", e))?;
        }

        let conn =
            Connection::open(db_path).map_err(|e| index_err("Failed to open SQLite index", e))?;
        let index = Self::with_connection(conn)?;

        tracing::debug!("Initialized SQLite index at {:?}", db_path);
        Ok(index)
    }

    /// In-memory index, used by tests.
    pub fn open_in_memory() -> RagResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| index_err("Failed to open in-memory index", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> RagResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                item_id TEXT NOT NULL,
                item_kind TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_source ON records(source);
            "#,
        )
        .map_err(|e| index_err("Failed to create tables", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> RagResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RagResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| RagError::IndexQueryFailed("SQLite connection poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| index_err("SQLite task failed", e))?
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> RagResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = records
            .iter()
            .map(|record| {
                let metadata = serde_json::to_string(&record.metadata)
                    .map_err(|e| index_err("Failed to serialize metadata", e))?;
                Ok((record.clone(), embedding_to_bytes(&record.embedding), metadata))
            })
            .collect::<RagResult<Vec<_>>>()?;

        let count = rows.len();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| index_err("Failed to begin transaction", e))?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO records \
                         (id, source, item_id, item_kind, text, embedding, metadata) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .map_err(|e| index_err("Failed to prepare insert", e))?;

                for (record, embedding, metadata) in &rows {
                    stmt.execute(params![
                        record.record_id,
                        record.metadata.source,
                        record.metadata.item_id,
                        record.metadata.item_kind,
                        record.text,
                        embedding,
                        metadata,
                    ])
                    .map_err(|e| index_err("Failed to insert record", e))?;
                }
            }
            tx.commit()
                .map_err(|e| index_err("Failed to commit records", e))
        })
        .await?;

        tracing::debug!("Upserted {} records into SQLite index", count);
        Ok(())
    }

    async fn delete(&self, filter: &RecordFilter) -> RagResult<usize> {
        let filter = filter.clone();
        let removed = self
            .with_conn(move |conn| {
                let removed = match &filter {
                    RecordFilter::Any => conn.execute("DELETE FROM records", []),
                    RecordFilter::Source(source) => {
                        conn.execute("DELETE FROM records WHERE source = ?1", params![source])
                    }
                };
                removed.map_err(|e| index_err("Failed to delete records", e))
            })
            .await?;

        tracing::debug!("Deleted {} records from SQLite index", removed);
        Ok(removed)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> RagResult<Vec<QueryMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = embedding.to_vec();
        let matches = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, text, embedding, metadata FROM records ORDER BY rowid")
                    .map_err(|e| index_err("Failed to prepare query", e))?;

                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })
                    .map_err(|e| index_err("Failed to query records", e))?;

                let mut matches = Vec::new();
                for row in rows {
                    let (record_id, text, embedding_bytes, metadata_json) =
                        row.map_err(|e| index_err("Failed to read record", e))?;
                    let stored = bytes_to_embedding(&embedding_bytes)?;
                    let metadata: RecordMetadata = serde_json::from_str(&metadata_json)
                        .map_err(|e| index_err("Failed to parse metadata", e))?;

                    matches.push(QueryMatch {
                        distance: cosine_distance(&query, &stored),
                        record_id,
                        text,
                        metadata,
                    });
                }
                Ok(matches)
            })
            .await?;

        let mut matches = matches;
        // Stable: equal distances keep insertion order.
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        tracing::debug!("Retrieved {} records (requested top-{})", matches.len(), k);
        Ok(matches)
    }

    async fn count(&self, filter: &RecordFilter) -> RagResult<usize> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let count: i64 = match &filter {
                RecordFilter::Any => {
                    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
                }
                RecordFilter::Source(source) => conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE source = ?1",
                    params![source],
                    |row| row.get(0),
                ),
            }
            .map_err(|e| index_err("Failed to count records", e))?;
            Ok(count as usize)
        })
        .await
    }

    async fn sources(&self) -> RagResult<Vec<(String, usize)>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT source, COUNT(*) FROM records GROUP BY source ORDER BY source")
                .map_err(|e| index_err("Failed to prepare source summary", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                })
                .map_err(|e| index_err("Failed to summarize sources", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| index_err("Failed to read source summary", e))
        })
        .await
    }
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> RagResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::IndexQueryFailed(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
