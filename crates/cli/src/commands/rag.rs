//! RAG command handler.
//!
//! Builds the vector index from record files and answers questions over it.

use super::{print_json, KnowledgeContext};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tutor_core::{config::AppConfig, AppResult};
use tutor_knowledge::{
    pdf, IndexBuilder, MaterialSelection, ProgressReporter, QueryEngine, Retriever, Tutor,
    DEFAULT_TOP_K,
};

/// Build, query and inspect the vector index
#[derive(Args, Debug)]
pub struct RagCommand {
    #[command(subcommand)]
    pub action: RagAction,
}

#[derive(Subcommand, Debug)]
pub enum RagAction {
    /// Rebuild the index from one record file or all of them
    Build(RagBuildCommand),
    /// Index the pages of a PDF directly
    BuildRaw(RagBuildRawCommand),
    /// Print the chunks nearest to a question
    Query(RagQueryCommand),
    /// Answer a question from the active material
    Ask(RagAskCommand),
    /// Show index statistics
    Stats(RagStatsCommand),
}

impl RagCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let ctx = KnowledgeContext::open(config).await?;
        match &self.action {
            RagAction::Build(cmd) => cmd.execute(ctx).await,
            RagAction::BuildRaw(cmd) => cmd.execute(ctx).await,
            RagAction::Query(cmd) => cmd.execute(ctx).await,
            RagAction::Ask(cmd) => cmd.execute(config, ctx).await,
            RagAction::Stats(cmd) => cmd.execute(ctx).await,
        }
    }
}

fn builder(ctx: &KnowledgeContext, json: bool) -> AppResult<IndexBuilder> {
    let builder = IndexBuilder::new(
        ctx.embedder.clone(),
        ctx.index.clone(),
        ctx.store.clone(),
        ctx.config.profiles,
        ctx.config.timeouts,
    )?;

    if json {
        return Ok(builder);
    }
    Ok(builder.with_progress(ProgressReporter::new(Arc::new(|event| {
        eprintln!("{}", event.format_simple());
    }))))
}

fn engine(ctx: &KnowledgeContext) -> QueryEngine {
    QueryEngine::new(ctx.embedder.clone(), ctx.index.clone(), ctx.config.timeouts)
}

#[derive(Args, Debug)]
pub struct RagBuildCommand {
    /// Record file to rebuild (default: every file in the parsed directory)
    pub source: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RagBuildCommand {
    pub async fn execute(&self, ctx: KnowledgeContext) -> AppResult<()> {
        let builder = builder(&ctx, self.json)?;

        let written = match &self.source {
            Some(source) => builder.rebuild_one(source).await?,
            None => builder.rebuild_all().await?,
        };
        let scope = self.source.as_deref().unwrap_or("all sources");

        if self.json {
            print_json(&serde_json::json!({
                "source": self.source,
                "records": written,
                "backend": ctx.index.backend_name(),
            }))?;
        } else {
            println!("Indexed {} records from {}", written, scope);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RagBuildRawCommand {
    /// PDF to index page by page
    pub pdf: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RagBuildRawCommand {
    pub async fn execute(&self, ctx: KnowledgeContext) -> AppResult<()> {
        let source = self
            .pdf
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.pdf.display().to_string());

        let pages = pdf::extract_pages(&self.pdf).await?;
        let written = builder(&ctx, self.json)?
            .rebuild_raw_pages(&source, &pages)
            .await?;

        if self.json {
            print_json(&serde_json::json!({
                "source": source,
                "pages": pages.len(),
                "records": written,
            }))?;
        } else {
            println!(
                "Indexed {} records from {} pages of {}",
                written,
                pages.len(),
                source
            );
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RagQueryCommand {
    /// Question text
    pub question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RagQueryCommand {
    pub async fn execute(&self, ctx: KnowledgeContext) -> AppResult<()> {
        let matches = engine(&ctx)
            .query_matches(&self.question, self.top_k)
            .await?;

        if self.json {
            print_json(&matches)?;
        } else if matches.is_empty() {
            println!("No matching chunks.");
        } else {
            for (rank, m) in matches.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} ({})",
                    rank + 1,
                    m.distance,
                    m.metadata.item_id,
                    m.metadata.source
                );
                println!("   {}", m.text.replace('\n', " "));
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RagAskCommand {
    /// Active material the question is about
    #[arg(long, env = "TUTOR_MATERIAL")]
    pub material: Option<String>,

    /// Question text
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RagAskCommand {
    pub async fn execute(&self, config: &AppConfig, ctx: KnowledgeContext) -> AppResult<()> {
        let endpoint = config
            .get_provider_config(&config.provider)
            .and_then(|p| p.endpoint());
        let api_key = config.resolve_api_key(&config.provider);
        let llm = tutor_llm::create_client(&config.provider, endpoint, api_key.as_deref())?;

        let retriever = Retriever::new(Arc::new(engine(&ctx)), ctx.config.retrieval);
        let tutor = Tutor::new(retriever, llm, &config.model, config.temperature())?;

        let mut selection = MaterialSelection::new();
        if let Some(material) = &self.material {
            selection.set(material.as_str());
        }

        let answer = tutor.ask(&selection, &self.question).await?;

        if self.json {
            print_json(&answer)?;
        } else {
            println!("Answer:");
            println!("{}", answer.answer);
            println!();

            if answer.sources.is_empty() {
                println!("Sources: (no sources available)");
            } else {
                println!("Sources:");
                for source in &answer.sources {
                    let preview: String = source.chars().take(150).collect();
                    println!("- {}", preview.replace('\n', " "));
                }
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RagStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RagStatsCommand {
    pub async fn execute(&self, ctx: KnowledgeContext) -> AppResult<()> {
        let stats = engine(&ctx).stats().await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!("Backend: {}", stats.backend);
            println!("Records: {}", stats.records);
            println!("Available record files: {}", ctx.store.list_sources()?.len());
            for source in &stats.sources {
                println!("  {} - {} records", source.source, source.records);
            }
        }
        Ok(())
    }
}
