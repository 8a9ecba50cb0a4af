//! Structural parser for exam sheets.
//!
//! Turns page texts into typed items (tasks, subtasks, grading criteria and
//! leading free text). Lines are classified in priority order: task header,
//! subtask marker, criteria header, points annotation, attachment, body.
//! Parsing never fails on text.

use crate::error::{RagError, RagResult};
use crate::pdf;
use crate::types::{ItemKind, SourceRecord, StructuralItem};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static TASK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Zadanie\s*\d+)").expect("Invalid task header pattern"));

static SUBTASK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-d])\)").expect("Invalid subtask marker pattern"));

static CRITERIA_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Kryteria oceniania").expect("Invalid criteria header pattern")
});

static POINTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*pkt").expect("Invalid points pattern"));

const ATTACHMENT_KEYWORDS: [&str; 3] = ["Rysunek", "Schemat", "Tabela"];

/// Suffix of the free-text item that collects lines before the first marker.
const FREE_TEXT_SUFFIX: &str = "TEKST";

/// Parse page texts of one document into structural items, in input order.
pub fn parse(source_document: &str, pages: &[String]) -> Vec<StructuralItem> {
    let mut state = ParserState::new(source_document);

    for page in pages {
        let page = normalize_page(page);
        if page.is_empty() {
            continue;
        }
        for line in page.lines() {
            state.feed(line.trim());
        }
    }

    state.finish()
}

/// Extract a PDF and parse it, using the file name as the source document.
pub async fn parse_pdf(path: &Path) -> RagResult<Vec<StructuralItem>> {
    let source_document = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| RagError::Extraction {
            path: path.to_path_buf(),
            reason: "Path has no file name".to_string(),
        })?;

    let pages = pdf::extract_pages(path).await?;
    let items = parse(&source_document, &pages);

    tracing::info!(
        source = %source_document,
        pages = pages.len(),
        items = items.len(),
        "Parsed document"
    );
    Ok(items)
}

/// Records for the index builder: indexable items only.
pub fn to_source_records(items: &[StructuralItem]) -> Vec<SourceRecord> {
    items
        .iter()
        .filter(|item| item.indexable)
        .map(SourceRecord::from)
        .collect()
}

fn normalize_page(page: &str) -> String {
    page.replace('\u{00A0}', " ")
        .replace('\t', "    ")
        .trim()
        .to_string()
}

struct ParserState<'a> {
    source: &'a str,
    items: Vec<StructuralItem>,
    current: Option<StructuralItem>,
    task_number: Option<String>,
}

impl<'a> ParserState<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            items: Vec::new(),
            current: None,
            task_number: None,
        }
    }

    fn feed(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        if let Some(caps) = TASK_HEADER.captures(line) {
            self.emit_current();
            let task_number = caps[1].replace(' ', "_");
            let id = format!("{}__{}", self.source, task_number);
            self.current = Some(self.open(id, ItemKind::Task, Some(task_number.clone()), None));
            self.task_number = Some(task_number);
            return;
        }

        if let (Some(caps), Some(task_number)) =
            (SUBTASK_MARKER.captures(line), self.task_number.clone())
        {
            // The predecessor survives only if it gathered some body text.
            if let Some(previous) = self.current.take() {
                if !previous.body_text.trim().is_empty() {
                    self.items.push(previous);
                }
            }
            let label = caps[1].to_string();
            let id = format!("{}__{}_{}", self.source, task_number, label);
            self.current = Some(self.open(id, ItemKind::Task, Some(task_number), Some(label)));
            return;
        }

        if CRITERIA_HEADER.is_match(line) {
            self.emit_current();
            let id = match &self.task_number {
                Some(task_number) => format!("{}__{}_KRYTERIA", self.source, task_number),
                None => format!("{}__KRYTERIA", self.source),
            };
            let mut item = self.open(id, ItemKind::GradingCriteria, self.task_number.clone(), None);
            item.indexable = false;
            self.current = Some(item);
            return;
        }

        if let Some(caps) = POINTS.captures(line) {
            if let Some(current) = self.current.as_mut() {
                if let Ok(points) = caps[1].parse::<u32>() {
                    current.max_points = Some(points);
                }
            }
            return;
        }

        let source = self.source;
        let current = self.current.get_or_insert_with(|| StructuralItem {
            id: format!("{}__{}", source, FREE_TEXT_SUFFIX),
            source_document: source.to_string(),
            kind: ItemKind::Text,
            task_number: None,
            subtask_label: None,
            body_text: String::new(),
            attachments: Vec::new(),
            max_points: None,
            indexable: true,
        });

        if ATTACHMENT_KEYWORDS.iter().any(|kw| line.contains(kw)) {
            current.attachments.push(format!("[{}]", line));
        } else {
            current.body_text.push_str(line);
            current.body_text.push(' ');
        }
    }

    fn open(
        &self,
        id: String,
        kind: ItemKind,
        task_number: Option<String>,
        subtask_label: Option<String>,
    ) -> StructuralItem {
        StructuralItem {
            id,
            source_document: self.source.to_string(),
            kind,
            task_number,
            subtask_label,
            body_text: String::new(),
            attachments: Vec::new(),
            max_points: None,
            indexable: true,
        }
    }

    fn emit_current(&mut self) {
        if let Some(item) = self.current.take() {
            self.items.push(item);
        }
    }

    fn finish(mut self) -> Vec<StructuralItem> {
        self.emit_current();
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("arkusz.pdf", &[]).is_empty());
        assert!(parse("arkusz.pdf", &pages("  \u{00A0} \t ")).is_empty());
    }

    #[test]
    fn test_subtasks_under_task() {
        let items = parse(
            "arkusz.pdf",
            &pages("Zadanie 1\ntreść a\na) pytanie\nodp\nb) pytanie2\nodp2"),
        );

        let subtasks: Vec<_> = items
            .iter()
            .filter(|i| i.subtask_label.is_some())
            .collect();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].subtask_label.as_deref(), Some("a"));
        assert_eq!(subtasks[0].id, "arkusz.pdf__Zadanie_1_a");
        assert_eq!(subtasks[0].body_text, "odp ");
        assert_eq!(subtasks[1].subtask_label.as_deref(), Some("b"));
        assert_eq!(subtasks[1].body_text, "odp2 ");
        assert!(subtasks
            .iter()
            .all(|s| s.task_number.as_deref() == Some("Zadanie_1")));

        // The narrative before "a)" stays on the task item.
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "arkusz.pdf__Zadanie_1");
        assert_eq!(items[0].body_text, "treść a ");
    }

    #[test]
    fn test_empty_header_dropped_before_subtask() {
        let items = parse("arkusz.pdf", &pages("Zadanie 1\na) pytanie\nodp\nb) x\nodp2"));

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["arkusz.pdf__Zadanie_1_a", "arkusz.pdf__Zadanie_1_b"]);
    }

    #[test]
    fn test_empty_subtask_dropped_before_next_subtask() {
        let items = parse("arkusz.pdf", &pages("Zadanie 2\nwstęp\na) nic\nb) coś\ntreść"));

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["arkusz.pdf__Zadanie_2", "arkusz.pdf__Zadanie_2_b"]);
    }

    #[test]
    fn test_task_header_case_and_spacing() {
        let items = parse("a.pdf", &pages("ZADANIE12 (0-2)\nTreść"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].task_number.as_deref(), Some("ZADANIE12"));

        let items = parse("a.pdf", &pages("Zadanie  7.\nTreść"));
        assert_eq!(items[0].task_number.as_deref(), Some("Zadanie__7"));
    }

    #[test]
    fn test_points_without_body_change() {
        let items = parse(
            "arkusz.pdf",
            &pages("Zadanie 4\nOblicz stężenie.\nza pełną odpowiedź: 3 pkt\nDane: 2 mole"),
        );

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].max_points, Some(3));
        assert_eq!(items[0].body_text, "Oblicz stężenie. Dane: 2 mole ");
        assert!(!items[0].body_text.contains("pkt"));
    }

    #[test]
    fn test_last_points_value_wins() {
        let items = parse("a.pdf", &pages("Zadanie 1\n1 pkt\ntreść\n2 PKT"));
        assert_eq!(items[0].max_points, Some(2));
    }

    #[test]
    fn test_criteria_not_indexable() {
        let items = parse(
            "klucz.pdf",
            &pages("Zadanie 3\nTreść zadania\nKryteria oceniania\n2 pkt – poprawna metoda"),
        );

        assert_eq!(items.len(), 2);
        let criteria = &items[1];
        assert_eq!(criteria.kind, ItemKind::GradingCriteria);
        assert_eq!(criteria.id, "klucz.pdf__Zadanie_3_KRYTERIA");
        assert_eq!(criteria.max_points, Some(2));
        assert!(!criteria.indexable);

        let records = to_source_records(&items);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "klucz.pdf__Zadanie_3");
    }

    #[test]
    fn test_criteria_without_task_number() {
        let items = parse("klucz.pdf", &pages("kryteria oceniania odpowiedzi\nopis"));
        assert_eq!(items[0].id, "klucz.pdf__KRYTERIA");
        assert_eq!(items[0].task_number, None);
    }

    #[test]
    fn test_attachments_collected() {
        let items = parse(
            "arkusz.pdf",
            &pages("Zadanie 5\nNa podstawie danych\nRysunek 1. Schemat aparatury\nTabela 2\nodpowiedz"),
        );

        assert_eq!(
            items[0].attachments,
            vec!["[Rysunek 1. Schemat aparatury]", "[Tabela 2]"]
        );
        assert_eq!(items[0].body_text, "Na podstawie danych odpowiedz ");
        assert_eq!(
            items[0].content(),
            "Na podstawie danych odpowiedz [Rysunek 1. Schemat aparatury] [Tabela 2]"
        );
    }

    #[test]
    fn test_leading_free_text_item() {
        let items = parse(
            "teoria.pdf",
            &pages("Informacje do zadań\na) to nie jest podzadanie\nZadanie 1\nTreść"),
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ItemKind::Text);
        assert_eq!(items[0].id, "teoria.pdf__TEKST");
        assert_eq!(
            items[0].body_text,
            "Informacje do zadań a) to nie jest podzadanie "
        );
        assert_eq!(items[1].kind, ItemKind::Task);
    }

    #[test]
    fn test_items_span_pages_and_normalize() {
        let items = parse(
            "arkusz.pdf",
            &[
                "Zadanie 1\n\tPoczątek\u{00A0}treści".to_string(),
                "   ".to_string(),
                "dalszy ciąg\nZadanie 2\nDrugie".to_string(),
            ],
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].body_text, "Początek treści dalszy ciąg ");
        assert_eq!(items[1].body_text, "Drugie ");
    }

    #[tokio::test]
    async fn test_parse_pdf_task_header_on_second_page() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dwie.pdf");
        crate::pdf::tests::write_pdf(&path, &["Zadanie 1 pierwsza", "Zadanie 2 druga"]);

        let items = parse_pdf(&path).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["dwie.pdf__Zadanie_1", "dwie.pdf__Zadanie_2"]);
    }
}
