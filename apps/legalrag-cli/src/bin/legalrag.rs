//! `legalrag`: ingest legal documents and answer questions over them.
//!
//! Usage:
//!   legalrag ingest [DIR] [--rebuild]     # index DIR (default: ingest.upload_dir)
//!   legalrag ask "<question>" [--metrics] # grounded answer with citations
//!   legalrag retrieve "<question>"        # retrieval + context only, no model call
//!   legalrag status                       # collection summary

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use legalrag_core::config::{resolve_with_base, Config};
use legalrag_core::metrics::AnswerMetrics;
use legalrag_hybrid::context::format_source;
use legalrag_hybrid::RagContext;

#[derive(Parser)]
#[command(name = "legalrag", version, about = "Retrieval-augmented answers over legal documents")]
struct Cli {
    /// Directory holding config.toml; relative paths in it resolve from here
    #[arg(long, default_value = ".")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean, split, embed and store every document in a directory
    Ingest {
        dir: Option<PathBuf>,
        /// Build a fresh collection and swap it in once ingestion succeeds
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a question from the indexed documents
    Ask {
        query: String,
        /// Print answer statistics as JSON
        #[arg(long)]
        metrics: bool,
    },
    /// Show the retrieved chunks and assembled context
    Retrieve { query: String },
    /// Show collection location, embedder and size
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base = resolve_with_base(&std::env::current_dir()?, &cli.config_dir);
    let settings = Config::load_from(&base)?.settings().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(base = %base.display(), "configuration loaded");

    let ctx = RagContext::open(settings, &base).await.context("failed to open collection")?;

    match cli.command {
        Command::Ingest { dir, rebuild } => {
            let report = ctx.ingest(dir.as_deref(), rebuild, true).await?;
            println!("Files seen:    {}", report.files_seen);
            println!("Files indexed: {}", report.files_indexed);
            for skipped in &report.skipped {
                println!("Skipped:       {} ({})", skipped.path.display(), skipped.reason);
            }
            if report.duplicates_skipped > 0 {
                println!("Duplicates:    {}", report.duplicates_skipped);
            }
            println!("Chunks added:  {}", report.chunks_added);
            println!("Collection:    {} chunks", report.collection_count);
        }
        Command::Ask { query, metrics } => {
            let answer = ctx.answer(&query).await?;
            println!("{}", answer.text);
            if !answer.supporting_chunks.is_empty() {
                println!("\nSources:");
                for (i, hit) in answer.supporting_chunks.iter().enumerate() {
                    println!("  [{}] {}", i + 1, format_source(&hit.chunk.metadata));
                }
            }
            if metrics {
                let m = AnswerMetrics::from_answer(&query, &answer);
                println!("\n{}", serde_json::to_string_pretty(&m)?);
            }
        }
        Command::Retrieve { query } => {
            let results = ctx.retrieve(&query).await?;
            if results.is_empty() {
                println!("No matching chunks.");
                return Ok(());
            }
            for (i, hit) in results.iter().enumerate() {
                println!("[{}] {} (distance {:.4})", i + 1, format_source(&hit.chunk.metadata), hit.distance);
            }
            println!("\n{}", ctx.context_for(&results));
        }
        Command::Status => {
            let status = ctx.status().await?;
            println!("Root:       {}", status.root.display());
            println!("Collection: {}", status.collection);
            println!("Embedder:   {} (dim {})", status.embedder, status.dim);
            println!("Chunks:     {}", status.chunks);
        }
    }
    Ok(())
}
