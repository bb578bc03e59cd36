use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::cleaner::clean;
use crate::config::IngestSettings;
use crate::error::{Error, Result};
use crate::splitter::TextSplitter;
use crate::types::DraftChunk;

/// Page exports are named `<stem>_p<page>_c<n>`.
static PAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_p(\d+)(?:_c\d+)?$").expect("page suffix pattern"));

const FORM_FEED: char = '\u{000C}';

/// Regular files found under an upload directory, plus the entries the
/// walk could not read.
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    /// Sorted. Unsupported files are included so the caller can report them.
    pub files: Vec<PathBuf>,
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Turns source files into cleaned, split draft chunks.
#[derive(Debug, Clone)]
pub struct DataProcessor {
    splitter: TextSplitter,
    extensions: Vec<String>,
    min_page_chars: usize,
}

impl DataProcessor {
    /// Keeps every PDF page; see [`DataProcessor::with_min_page_chars`].
    pub fn new(splitter: TextSplitter, extensions: Vec<String>) -> Self {
        let extensions = extensions.into_iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { splitter, extensions, min_page_chars: 0 }
    }

    /// Drop PDF pages with fewer than `min_page_chars` characters after cleaning.
    pub fn with_min_page_chars(mut self, min_page_chars: usize) -> Self {
        self.min_page_chars = min_page_chars;
        self
    }

    pub fn from_settings(settings: &IngestSettings) -> Result<Self> {
        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
        Ok(Self::new(splitter, settings.extensions.clone()).with_min_page_chars(settings.min_page_chars))
    }

    /// Every regular file under `data_dir`, sorted.
    pub fn list_source_files(&self, data_dir: &Path) -> Result<Vec<PathBuf>> {
        self.scan_source_dir(data_dir).map(|scan| scan.files)
    }

    /// Walk `data_dir` (following symlinks). Entries that cannot be read are
    /// logged and collected in [`SourceScan::unreadable`] instead of failing
    /// the walk.
    pub fn scan_source_dir(&self, data_dir: &Path) -> Result<SourceScan> {
        if !data_dir.is_dir() {
            return Err(Error::IngestionInput { path: data_dir.to_path_buf(), reason: "not a directory".into() });
        }
        let mut scan = SourceScan::default();
        for entry in walkdir::WalkDir::new(data_dir).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => scan.files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().map_or_else(|| data_dir.to_path_buf(), Path::to_path_buf);
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    scan.unreadable.push((path, e.to_string()));
                }
            }
        }
        if scan.files.is_empty() {
            return Err(Error::IngestionInput { path: data_dir.to_path_buf(), reason: "no documents found".into() });
        }
        scan.files.sort();
        Ok(scan)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Read, clean, and split one file. Fails with `IngestionInput` for
    /// unsupported or unreadable files.
    pub fn process_file(&self, file_path: &Path) -> Result<Vec<DraftChunk>> {
        if !self.is_supported(file_path) {
            return Err(Error::IngestionInput { path: file_path.to_path_buf(), reason: "unsupported file type".into() });
        }
        let source = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::IngestionInput { path: file_path.to_path_buf(), reason: "missing file name".into() })?;
        let chunks = if is_pdf(file_path) {
            let pages = read_pdf_pages(file_path)?;
            self.process_pdf_pages(&source, &pages)
        } else {
            let content = read_file_content(file_path)?;
            self.process_text(&source, &content, page_from_file_name(file_path))
        };
        tracing::debug!(source = %source, chunks = chunks.len(), "processed file");
        Ok(chunks)
    }

    /// Clean and split extracted PDF pages (page numbers from 1), dropping
    /// pages shorter than the configured minimum.
    pub fn process_pdf_pages(&self, source: &str, pages: &[String]) -> Vec<DraftChunk> {
        let mut chunks = Vec::new();
        for (i, raw) in pages.iter().enumerate() {
            let cleaned = clean(raw);
            if cleaned.chars().count() < self.min_page_chars {
                tracing::debug!(source, page = i + 1, chars = cleaned.chars().count(), "dropping short page");
                continue;
            }
            self.push_chunks(&mut chunks, source, u32::try_from(i + 1).ok(), &cleaned);
        }
        chunks
    }

    /// Clean and split `raw`. Form feeds mark page breaks (pages numbered
    /// from 1); without them the whole text is tagged with `page_hint`.
    pub fn process_text(&self, source: &str, raw: &str, page_hint: Option<u32>) -> Vec<DraftChunk> {
        let pages: Vec<(Option<u32>, &str)> = if raw.contains(FORM_FEED) {
            raw.split(FORM_FEED).enumerate().map(|(i, p)| (u32::try_from(i + 1).ok(), p)).collect()
        } else {
            vec![(page_hint, raw)]
        };

        let mut chunks = Vec::new();
        for (page, page_text) in pages {
            self.push_chunks(&mut chunks, source, page, &clean(page_text));
        }
        chunks
    }

    /// Split one cleaned page, continuing the document's chunk numbering.
    fn push_chunks(&self, chunks: &mut Vec<DraftChunk>, source: &str, page: Option<u32>, cleaned: &str) {
        for piece in self.splitter.split(cleaned) {
            if piece.trim().is_empty() {
                continue;
            }
            let chunk_index = chunks.len();
            chunks.push(DraftChunk::new(piece, source, page, chunk_index));
        }
    }
}

fn is_pdf(file_path: &Path) -> bool {
    file_path.extension().and_then(|s| s.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Text of each page, in order.
fn read_pdf_pages(file_path: &Path) -> Result<Vec<String>> {
    let bad_pdf = |reason: String| Error::IngestionInput { path: file_path.to_path_buf(), reason };
    let bytes = fs::read(file_path).map_err(|e| bad_pdf(e.to_string()))?;
    // pdf-extract panics on some malformed documents.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(bad_pdf(format!("unreadable PDF: {e}"))),
        Err(_) => Err(bad_pdf("unreadable PDF: extractor panicked".into())),
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    let unreadable = |e: std::io::Error| Error::IngestionInput { path: file_path.to_path_buf(), reason: e.to_string() };
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Ok(String::from_utf8_lossy(&fs::read(file_path).map_err(unreadable)?).to_string())
        }
        Err(e) => Err(unreadable(e)),
    }
}

fn page_from_file_name(file_path: &Path) -> Option<u32> {
    let stem = file_path.file_stem()?.to_str()?;
    PAGE_SUFFIX.captures(stem)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_from_export_name() {
        assert_eq!(page_from_file_name(Path::new("evidence_act_p12_c0.txt")), Some(12));
        assert_eq!(page_from_file_name(Path::new("evidence_act_p3.txt")), Some(3));
        assert_eq!(page_from_file_name(Path::new("evidence_act.txt")), None);
    }
}
