//! Basic per-answer statistics for logging and evaluation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Answer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMetrics {
    pub query: String,
    pub chunks_used: usize,
    /// Distinct source names, sorted.
    pub unique_sources: Vec<String>,
    /// Total characters of supporting chunk text.
    pub context_chars: usize,
    pub answer_chars: usize,
}

impl AnswerMetrics {
    pub fn from_answer(query: &str, answer: &Answer) -> Self {
        let sources: BTreeSet<&str> =
            answer.supporting_chunks.iter().map(|c| c.chunk.metadata.source.as_str()).collect();
        Self {
            query: query.to_string(),
            chunks_used: answer.supporting_chunks.len(),
            unique_sources: sources.into_iter().map(str::to_string).collect(),
            context_chars: answer.supporting_chunks.iter().map(|c| c.chunk.text.chars().count()).sum(),
            answer_chars: answer.text.chars().count(),
        }
    }
}
