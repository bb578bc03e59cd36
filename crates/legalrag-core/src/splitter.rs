//! Overlapping fixed-size chunking that prefers natural boundaries.
//!
//! Chunks are exact character spans of the input. Chunk `i + 1` starts
//! `overlap` characters before chunk `i` ends, so concatenating the chunks
//! with the overlaps removed reproduces the input.

use crate::error::{Error, Result};

/// Boundary levels, largest first. A chunk ends right after a separator of
/// the first level that has one inside the window; otherwise it is cut hard.
const BOUNDARY_LEVELS: &[&[&str]] = &[
    &["\n\n"],
    &["\n"],
    &[". ", "? ", "! ", "; "],
    &[" "],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// `chunk_size` and `overlap` are measured in characters;
    /// `0 <= overlap < chunk_size` is required.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn overlap(&self) -> usize { self.overlap }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let hard_end = start + self.chunk_size;
            if hard_end >= total {
                chunks.push(chars[start..].iter().collect());
                break;
            }
            // The end must stay past the overlap so the next chunk advances.
            let end = BOUNDARY_LEVELS
                .iter()
                .find_map(|seps| last_boundary(&chars, start + self.overlap, hard_end, seps))
                .unwrap_or(hard_end);
            chunks.push(chars[start..end].iter().collect());
            start = end - self.overlap;
        }
        chunks
    }
}

/// Split `text` into chunks of at most `chunk_size` characters sharing
/// `overlap` characters between neighbours.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(TextSplitter::new(chunk_size, overlap)?.split(text))
}

/// Largest `end` in `(floor, ceil]` such that `chars[..end]` ends with one of `seps`.
fn last_boundary(chars: &[char], floor: usize, ceil: usize, seps: &[&str]) -> Option<usize> {
    (floor + 1..=ceil).rev().find(|&end| {
        seps.iter().any(|sep| {
            let len = sep.chars().count();
            end >= len && chars[end - len..end].iter().copied().eq(sep.chars())
        })
    })
}
