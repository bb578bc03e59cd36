//! Retrieval and answering on top of the vector store: keyword-filtered
//! vector retrieval, context assembly, grounded answering, and ingestion.

pub mod context;
pub mod filter;
pub mod ingest;
pub mod orchestrator;
pub mod pipeline;
pub mod retriever;

pub use context::{assemble, format_source};
pub use filter::{AllTermsFilter, AllTermsOrVectorFilter, CandidateFilter, PassThrough};
pub use ingest::{ingest_directory, IngestOptions, IngestReport};
pub use orchestrator::{build_prompt, Answerer, NO_EVIDENCE_ANSWER};
pub use pipeline::{CollectionStatus, RagContext};
pub use retriever::HybridRetriever;
