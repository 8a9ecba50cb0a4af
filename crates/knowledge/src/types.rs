//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a structural item found in an exam sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A task ("Zadanie") or one of its subtasks.
    Task,
    /// A grading-criteria block ("Kryteria oceniania"); never indexed.
    GradingCriteria,
    /// Free text before the first structural marker.
    Text,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::GradingCriteria => "grading_criteria",
            ItemKind::Text => "text",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical unit of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralItem {
    /// `{source_document}__{task_number}[_{subtask}|_KRYTERIA]`
    pub id: String,

    /// File name of the document the item came from
    pub source_document: String,

    pub kind: ItemKind,

    /// e.g. `Zadanie_3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_number: Option<String>,

    /// Single letter `a`..`d`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask_label: Option<String>,

    /// Accumulated text, each line followed by one space
    #[serde(default)]
    pub body_text: String,

    /// Placeholders such as `[Rysunek 1]`, in document order
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Last point value seen while the item was open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_points: Option<u32>,

    /// False for grading criteria
    pub indexable: bool,
}

impl StructuralItem {
    /// Text handed to the indexer: body followed by attachment placeholders.
    pub fn content(&self) -> String {
        let mut content = self.body_text.clone();
        for attachment in &self.attachments {
            content.push_str(attachment);
            content.push(' ');
        }
        content.trim().to_string()
    }
}

/// Item file written next to the record file for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub source_document: String,
    pub parsed_at: DateTime<Utc>,
    pub items: Vec<StructuralItem>,
}

/// One entry of a pre-parsed record file: `{"id", "type", "content"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub content: String,
}

impl From<&StructuralItem> for SourceRecord {
    fn from(item: &StructuralItem) -> Self {
        Self {
            id: item.id.clone(),
            kind: item.kind.to_string(),
            content: item.content(),
        }
    }
}

/// A bounded text segment produced by the chunker for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,

    /// Id of the record (or page) the chunk was cut from
    pub source_id: String,

    /// Position among the chunks of that record
    pub sequence_index: usize,
}

/// Metadata persisted with every index record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Record file (or PDF) the chunk belongs to
    pub source: String,

    /// Id of the source record / page
    pub item_id: String,

    /// `task`, `text`, `page`, ...
    pub item_kind: String,

    pub chunk_index: usize,

    /// SHA-256 of the chunk text, hex encoded
    pub content_hash: String,
}

/// The persisted unit of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// `{source}-{n}`, `n` running over the whole source
    pub record_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// A nearest-neighbour hit, smaller distance is closer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub record_id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    pub distance: f32,
}

/// Selects records for delete/count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every record in the namespace
    Any,
    /// Records whose `metadata.source` equals the value
    Source(String),
}

/// Summary of the index contents.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub backend: String,
    pub records: usize,
    pub sources: Vec<SourceStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub records: usize,
}
