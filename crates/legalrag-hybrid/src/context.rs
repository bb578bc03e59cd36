//! Citation-numbered context blocks under a character budget.

use legalrag_core::types::{ChunkMetadata, ScoredChunk};

const BLOCK_SEPARATOR: &str = "\n\n";

/// `"{source} p.{page}"`, or the bare source name without a page.
pub fn format_source(metadata: &ChunkMetadata) -> String {
    match metadata.page {
        Some(page) => format!("{} p.{page}", metadata.source),
        None => metadata.source.clone(),
    }
}

/// Join `[i] source\ntext` blocks (numbered from 1) with blank lines.
///
/// Stops before the first block that would take the output past
/// `max_chars` characters, separators included; blocks are never cut.
pub fn assemble(results: &[ScoredChunk], max_chars: usize) -> String {
    assemble_counted(results, max_chars).0
}

/// As [`assemble`], also returning how many leading results made it in.
pub fn assemble_counted(results: &[ScoredChunk], max_chars: usize) -> (String, usize) {
    let mut out = String::new();
    let mut used = 0usize;
    let mut blocks = 0usize;
    for (i, hit) in results.iter().enumerate() {
        let block = format!("[{}] {}\n{}", i + 1, format_source(&hit.chunk.metadata), hit.chunk.text);
        let block = block.trim();
        let sep = if out.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
        let len = block.chars().count();
        if used + sep + len > max_chars {
            break;
        }
        if sep > 0 {
            out.push_str(BLOCK_SEPARATOR);
        }
        out.push_str(block);
        used += sep + len;
        blocks += 1;
    }
    (out, blocks)
}
