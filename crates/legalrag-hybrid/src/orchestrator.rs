use std::sync::Arc;

use tracing::info;

use legalrag_core::traits::LanguageModel;
use legalrag_core::types::Answer;
use legalrag_core::Result;

use crate::context::assemble_counted;
use crate::retriever::HybridRetriever;

/// Returned without calling the language model when retrieval finds nothing.
pub const NO_EVIDENCE_ANSWER: &str =
    "No relevant sections were found in the indexed documents for this question.";

pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a legal research assistant. Answer the question using only the numbered context below. \
Cite the blocks you rely on by number, e.g. [1]. If the context does not contain the answer, \
say that the provided documents do not cover it.\n\n\
Context:\n{context}\n\n\
Question: {query}\n\n\
Answer:"
    )
}

pub struct Answerer {
    retriever: Arc<HybridRetriever>,
    llm: Arc<dyn LanguageModel>,
    max_context_chars: usize,
}

impl Answerer {
    pub fn new(retriever: Arc<HybridRetriever>, llm: Arc<dyn LanguageModel>, max_context_chars: usize) -> Self {
        Self { retriever, llm, max_context_chars }
    }

    /// Retrieve, assemble, and generate. Model failures propagate unchanged.
    ///
    /// When the assembled context is empty the fixed [`NO_EVIDENCE_ANSWER`]
    /// is returned and the model is not called.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let mut results = self.retriever.retrieve(query).await?;
        let (context, blocks) = assemble_counted(&results, self.max_context_chars);
        if context.is_empty() {
            info!(query, "no evidence found");
            return Ok(Answer { text: NO_EVIDENCE_ANSWER.to_string(), supporting_chunks: Vec::new(), grounded: false });
        }

        // Only chunks that made it into the prompt count as support.
        results.truncate(blocks);
        let text = self.llm.generate(&build_prompt(query, &context)).await?;
        info!(model = self.llm.model_id(), chunks = results.len(), "answer generated");
        Ok(Answer { text, supporting_chunks: results, grounded: true })
    }
}
