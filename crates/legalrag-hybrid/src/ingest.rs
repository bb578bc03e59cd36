//! Batch ingestion of an upload directory into the vector store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use legalrag_core::data_processor::DataProcessor;
use legalrag_core::{Error, Result};
use legalrag_vector::{content_hash, VectorStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Wipe the collection before ingesting.
    pub rebuild: bool,
    /// Skip chunks whose text is already stored.
    pub skip_duplicates: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub skipped: Vec<SkippedFile>,
    pub chunks_added: usize,
    pub duplicates_skipped: usize,
    pub collection_count: usize,
}

/// Ingest every file under `dir`, one embedding batch per file.
///
/// Unsupported or unreadable files are recorded in the report and skipped.
/// Embedding and storage failures abort the run; files already written
/// stay written. A rebuild writes into a staging collection that replaces
/// the live one only when every file went through, so an aborted rebuild
/// leaves the previous collection untouched.
pub async fn ingest_directory(
    store: &VectorStore,
    processor: &DataProcessor,
    dir: &Path,
    options: IngestOptions,
) -> Result<IngestReport> {
    let scan = processor.scan_source_dir(dir)?;
    let mut report = IngestReport { files_seen: scan.files.len(), ..IngestReport::default() };
    report.skipped.extend(scan.unreadable.into_iter().map(|(path, reason)| SkippedFile { path, reason }));

    let staging = if options.rebuild { Some(store.staging().await?) } else { None };
    let target = staging.as_ref().unwrap_or(store);
    let outcome = ingest_files(target, processor, &scan.files, options, &mut report).await;

    match (outcome, staging) {
        (Ok(()), Some(staging)) => store.replace_with(staging).await?,
        (Ok(()), None) => {}
        (Err(e), Some(staging)) => {
            if let Err(cleanup) = staging.reset().await {
                warn!(error = %cleanup, "failed to discard staging collection");
            }
            warn!(collection = store.collection(), error = %e, "rebuild aborted; collection left unchanged");
            return Err(e);
        }
        (Err(e), None) => return Err(e),
    }

    report.collection_count = store.count().await?;
    info!(
        dir = %dir.display(),
        files = report.files_seen,
        indexed = report.files_indexed,
        skipped = report.skipped.len(),
        chunks = report.chunks_added,
        total = report.collection_count,
        "ingestion finished"
    );
    Ok(report)
}

async fn ingest_files(
    target: &VectorStore,
    processor: &DataProcessor,
    files: &[PathBuf],
    options: IngestOptions,
    report: &mut IngestReport,
) -> Result<()> {
    let mut known: HashSet<String> =
        if options.skip_duplicates { target.content_hashes().await? } else { HashSet::new() };

    let pb = if options.show_progress { ProgressBar::new(files.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }

    for path in files {
        pb.set_message(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
        let drafts = match processor.process_file(path) {
            Ok(drafts) => drafts,
            Err(Error::IngestionInput { path, reason }) => {
                warn!(path = %path.display(), %reason, "skipping file");
                report.skipped.push(SkippedFile { path, reason });
                pb.inc(1);
                continue;
            }
            Err(e) => return Err(e),
        };

        let drafts = if options.skip_duplicates {
            let before = drafts.len();
            let fresh: Vec<_> = drafts.into_iter().filter(|d| known.insert(content_hash(d.text.trim()))).collect();
            report.duplicates_skipped += before - fresh.len();
            fresh
        } else {
            drafts
        };

        let ids = target.add(&drafts).await?;
        report.chunks_added += ids.len();
        report.files_indexed += 1;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}
