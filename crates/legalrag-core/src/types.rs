//! Domain types shared by ingestion, storage, and retrieval.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Where a chunk came from.
///
/// - `source`: file name of the source document (no directory part)
/// - `page`: page number when the document carries page structure
/// - `chunk_index`: position of the chunk within its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
}

/// A chunk that has been produced by the splitter but not yet persisted.
/// The store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl DraftChunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: Option<u32>, chunk_index: usize) -> Self {
        Self { text: text.into(), metadata: ChunkMetadata { source: source.into(), page, chunk_index } }
    }
}

/// A persisted chunk. Immutable; identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from a vector query together with its distance to the
/// query vector (lower is nearer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Chunks judged relevant to a query, in vector-similarity order.
pub type RetrievalResult = Vec<ScoredChunk>;

/// A generated answer and the evidence it was grounded on.
///
/// `grounded` is false when no evidence was found and the fixed no-evidence
/// reply was returned without calling the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub supporting_chunks: RetrievalResult,
    pub grounded: bool,
}
