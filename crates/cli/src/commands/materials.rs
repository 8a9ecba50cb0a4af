//! Materials command handler.
//!
//! Turns source PDFs into record files for the index builder.

use super::print_json;
use clap::{Args, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tutor_core::{config::AppConfig, AppResult};
use tutor_knowledge::config::load_config;
use tutor_knowledge::sources::record_file_name;
use tutor_knowledge::{parser, SourceStore};
use walkdir::WalkDir;

/// Parse source PDFs into record files
#[derive(Args, Debug)]
pub struct MaterialsCommand {
    #[command(subcommand)]
    pub action: MaterialsAction,
}

#[derive(Subcommand, Debug)]
pub enum MaterialsAction {
    /// Parse PDFs into structural items and record files
    Parse(MaterialsParseCommand),
}

impl MaterialsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            MaterialsAction::Parse(cmd) => cmd.execute(config).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct MaterialsParseCommand {
    /// PDF file or directory (default: the configured materials directory)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl MaterialsParseCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let knowledge = load_config(&config.workspace)?;
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| knowledge.materials_dir(&config.workspace));
        let store = SourceStore::new(knowledge.parsed_dir(&config.workspace));

        let pdfs = discover_pdfs(&input);
        tracing::info!("Parsing {} PDF files from {:?}", pdfs.len(), input);

        let mut parsed = Vec::new();
        let mut failed = Vec::new();
        let (pdfs, collisions) = split_record_collisions(pdfs);
        for (path, kept) in &collisions {
            tracing::warn!("Skipping {:?}: record file already produced by {:?}", path, kept);
            failed.push(serde_json::json!({
                "document": file_name(path),
                "error": format!("record file name collides with {}", file_name(kept)),
            }));
        }
        for path in &pdfs {
            match parser::parse_pdf(path).await {
                Ok(items) => {
                    let document = file_name(path);
                    let item_count = items.len();
                    let source = store.save_parsed(&document, items)?;
                    parsed.push(serde_json::json!({
                        "document": document,
                        "source": source,
                        "items": item_count,
                    }));
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    failed.push(serde_json::json!({
                        "document": file_name(path),
                        "error": e.to_string(),
                    }));
                }
            }
        }

        if self.json {
            print_json(&serde_json::json!({
                "parsedDir": store.parsed_dir().display().to_string(),
                "parsed": parsed,
                "failed": failed,
            }))?;
        } else {
            for entry in &parsed {
                println!(
                    "{} -> {} ({} items)",
                    entry["document"].as_str().unwrap_or_default(),
                    entry["source"].as_str().unwrap_or_default(),
                    entry["items"]
                );
            }
            println!(
                "Parsed {} of {} documents into {}",
                parsed.len(),
                pdfs.len() + collisions.len(),
                store.parsed_dir().display()
            );
        }

        Ok(())
    }
}

/// PDF files directly in `input` (or `input` itself), sorted.
fn discover_pdfs(input: &Path) -> Vec<PathBuf> {
    let mut pdfs: Vec<PathBuf> = WalkDir::new(input)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdfs.sort();
    pdfs
}

/// Keep the first PDF for each record file name. Later ones are returned
/// with the path that claimed the name.
fn split_record_collisions(pdfs: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>) {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    let mut kept = Vec::new();
    let mut collisions = Vec::new();
    for path in pdfs {
        let name = record_file_name(&file_name(&path));
        match claimed.get(&name) {
            Some(first) => collisions.push((path, first.clone())),
            None => {
                claimed.insert(name, path.clone());
                kept.push(path);
            }
        }
    }
    (kept, collisions)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
