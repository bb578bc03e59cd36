use std::sync::Arc;

use tracing::debug;

use legalrag_core::types::RetrievalResult;
use legalrag_core::Result;
use legalrag_vector::VectorStore;

use crate::filter::CandidateFilter;

/// Vector search for recall, then a keyword post-filter for precision.
pub struct HybridRetriever {
    store: Arc<VectorStore>,
    filter: Box<dyn CandidateFilter>,
    candidate_k: usize,
    top_n: usize,
}

impl HybridRetriever {
    pub fn new(store: Arc<VectorStore>, filter: Box<dyn CandidateFilter>, candidate_k: usize, top_n: usize) -> Self {
        Self { store, filter, candidate_k, top_n }
    }

    pub fn store(&self) -> &Arc<VectorStore> { &self.store }

    /// At most `top_n` chunks, in vector-similarity order, that survive the
    /// filter. An empty collection yields an empty result.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        // The store's embedder is the one the collection was built with.
        let query_vector = self.store.embedder().embed_query(query).await?;
        let candidates = self.store.query_by_vector(&query_vector, self.candidate_k).await?;
        let candidate_count = candidates.len();

        let mut survivors = self.filter.filter(candidates, query);
        survivors.truncate(self.top_n);
        debug!(filter = self.filter.name(), candidates = candidate_count, returned = survivors.len(), "retrieved");
        Ok(survivors)
    }
}
