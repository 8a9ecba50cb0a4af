//! Pre-parsed record files.
//!
//! The parsed directory holds one `<name>.json` record file per document
//! (`[{"id", "type", "content"}, ...]`) and, under `items/`, the full
//! structural items for inspection.

use crate::error::{RagError, RagResult};
use crate::parser::to_source_records;
use crate::types::{ParsedDocument, SourceRecord, StructuralItem};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const RECORD_EXTENSION: &str = "json";
const ITEMS_DIR: &str = "items";

/// Reads and writes the record files of one parsed directory.
#[derive(Debug, Clone)]
pub struct SourceStore {
    parsed_dir: PathBuf,
}

impl SourceStore {
    pub fn new(parsed_dir: impl Into<PathBuf>) -> Self {
        Self {
            parsed_dir: parsed_dir.into(),
        }
    }

    pub fn parsed_dir(&self) -> &Path {
        &self.parsed_dir
    }

    /// Canonical source name: the record file name, `.json` included.
    ///
    /// Names that would escape the parsed directory are not sources.
    pub fn resolve_name(&self, name: &str) -> RagResult<String> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(RagError::SourceNotFound {
                name: name.to_string(),
            });
        }

        if name.ends_with(".json") {
            Ok(name.to_string())
        } else {
            Ok(format!("{}.{}", name, RECORD_EXTENSION))
        }
    }

    /// Record file names in the parsed directory, sorted.
    pub fn list_sources(&self) -> RagResult<Vec<String>> {
        if !self.parsed_dir.is_dir() {
            tracing::debug!("Parsed directory {:?} does not exist", self.parsed_dir);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.parsed_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(|e| {
                RagError::Io(std::io::Error::other(format!(
                    "Failed to scan {:?}: {}",
                    self.parsed_dir, e
                )))
            })?;

            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
            {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Load and validate one record file.
    pub fn load(&self, name: &str) -> RagResult<Vec<SourceRecord>> {
        let name = self.resolve_name(name)?;
        let path = self.parsed_dir.join(&name);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::SourceNotFound { name });
            }
            Err(e) => return Err(RagError::Io(e)),
        };

        let records: Vec<SourceRecord> =
            serde_json::from_str(&content).map_err(|e| RagError::InvalidSourceFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(position) = records.iter().position(|r| r.id.trim().is_empty()) {
            return Err(RagError::InvalidSourceFile {
                path,
                reason: format!("record {} has an empty id", position),
            });
        }

        tracing::debug!(source = %name, records = records.len(), "Loaded record file");
        Ok(records)
    }

    /// Write the record file for a document, returning the source name.
    pub fn write_records(&self, document: &str, records: &[SourceRecord]) -> RagResult<String> {
        let name = record_file_name(document);
        fs::create_dir_all(&self.parsed_dir)?;

        let json = serde_json::to_string_pretty(records).map_err(|e| {
            RagError::InvalidConfiguration(format!("Failed to serialize records: {}", e))
        })?;
        fs::write(self.parsed_dir.join(&name), json)?;

        tracing::debug!(source = %name, records = records.len(), "Wrote record file");
        Ok(name)
    }

    /// Write the structural item file used for inspection.
    pub fn write_items(&self, document: &ParsedDocument) -> RagResult<PathBuf> {
        let dir = self.parsed_dir.join(ITEMS_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(record_file_name(&document.source_document));
        let json = serde_json::to_string_pretty(document).map_err(|e| {
            RagError::InvalidConfiguration(format!("Failed to serialize items: {}", e))
        })?;
        fs::write(&path, json)?;

        Ok(path)
    }

    /// Persist parser output: the item file plus the indexable record file.
    ///
    /// Returns the source name of the record file.
    pub fn save_parsed(&self, source_document: &str, items: Vec<StructuralItem>) -> RagResult<String> {
        let records = to_source_records(&items);
        let name = self.write_records(source_document, &records)?;
        self.write_items(&ParsedDocument {
            source_document: source_document.to_string(),
            parsed_at: Utc::now(),
            items,
        })?;
        Ok(name)
    }
}

/// `arkusz.pdf` -> `arkusz.json`.
pub fn record_file_name(document: &str) -> String {
    let stem = Path::new(document)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| document.to_string());
    format!("{}.{}", stem, RECORD_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemKind;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_name() {
        let store = SourceStore::new("parsed");
        assert_eq!(store.resolve_name("arkusz").unwrap(), "arkusz.json");
        assert_eq!(store.resolve_name("arkusz.json").unwrap(), "arkusz.json");
        assert!(matches!(
            store.resolve_name("../etc/passwd"),
            Err(RagError::SourceNotFound { .. })
        ));
        assert!(store.resolve_name("  ").is_err());
    }

    #[test]
    fn test_list_sources_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.json"), "[]").unwrap();
        fs::write(temp.path().join("a.json"), "[]").unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(temp.path().join("items")).unwrap();
        fs::write(temp.path().join("items").join("c.json"), "{}").unwrap();

        let store = SourceStore::new(temp.path());
        assert_eq!(store.list_sources().unwrap(), vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_list_sources_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = SourceStore::new(temp.path().join("missing"));
        assert!(store.list_sources().unwrap().is_empty());
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let store = SourceStore::new(temp.path());

        assert!(matches!(
            store.load("brak"),
            Err(RagError::SourceNotFound { name }) if name == "brak.json"
        ));

        fs::write(temp.path().join("zly.json"), r#"{"id": "x"}"#).unwrap();
        assert!(matches!(
            store.load("zly.json"),
            Err(RagError::InvalidSourceFile { .. })
        ));

        fs::write(
            temp.path().join("pusty_id.json"),
            r#"[{"id": " ", "type": "task", "content": "x"}]"#,
        )
        .unwrap();
        assert!(matches!(
            store.load("pusty_id"),
            Err(RagError::InvalidSourceFile { .. })
        ));
    }

    #[test]
    fn test_write_then_load_records_and_items() {
        let temp = TempDir::new().unwrap();
        let store = SourceStore::new(temp.path().join("parsed"));

        let item = StructuralItem {
            id: "arkusz.pdf__Zadanie_1".to_string(),
            source_document: "arkusz.pdf".to_string(),
            kind: ItemKind::Task,
            task_number: Some("Zadanie_1".to_string()),
            subtask_label: None,
            body_text: "Oblicz masę. ".to_string(),
            attachments: vec![],
            max_points: Some(2),
            indexable: true,
        };
        let records = vec![SourceRecord::from(&item)];

        let name = store.write_records("arkusz.pdf", &records).unwrap();
        assert_eq!(name, "arkusz.json");
        assert_eq!(store.load(&name).unwrap(), records);

        let items_path = store
            .write_items(&ParsedDocument {
                source_document: "arkusz.pdf".to_string(),
                parsed_at: Utc::now(),
                items: vec![item],
            })
            .unwrap();
        assert!(items_path.ends_with("items/arkusz.json"));
        assert_eq!(store.list_sources().unwrap(), vec!["arkusz.json"]);
    }

    #[test]
    fn test_save_parsed_drops_criteria_from_records() {
        let temp = TempDir::new().unwrap();
        let store = SourceStore::new(temp.path());
        let pages = vec![
            "Zadanie 1\nOblicz masę.\nKryteria oceniania\n2 pkt za obliczenia".to_string(),
        ];
        let items = crate::parser::parse("arkusz.pdf", &pages);
        assert_eq!(items.len(), 2);

        let name = store.save_parsed("arkusz.pdf", items).unwrap();
        let records = store.load(&name).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "arkusz.pdf__Zadanie_1");
        assert!(temp.path().join("items").join("arkusz.json").exists());
    }
}
