//! Post-filters applied to vector candidates before truncation.
//!
//! A filter only removes candidates; it never reorders them.

use legalrag_core::config::KeywordFilterMode;
use legalrag_core::types::ScoredChunk;

pub trait CandidateFilter: Send + Sync {
    fn name(&self) -> &'static str;
    fn filter(&self, candidates: Vec<ScoredChunk>, query: &str) -> Vec<ScoredChunk>;
}

/// Lowercased whitespace-delimited query words.
pub fn query_terms(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Keeps candidates whose lowercased text contains every query word as a
/// substring. A query with no words keeps everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllTermsFilter;

impl CandidateFilter for AllTermsFilter {
    fn name(&self) -> &'static str { "all_terms" }

    fn filter(&self, candidates: Vec<ScoredChunk>, query: &str) -> Vec<ScoredChunk> {
        let terms = query_terms(query);
        candidates
            .into_iter()
            .filter(|c| {
                let text = c.chunk.text.to_lowercase();
                terms.iter().all(|t| text.contains(t.as_str()))
            })
            .collect()
    }
}

/// [`AllTermsFilter`], falling back to the unfiltered candidates when
/// nothing matches literally.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllTermsOrVectorFilter;

impl CandidateFilter for AllTermsOrVectorFilter {
    fn name(&self) -> &'static str { "all_terms_or_vector" }

    fn filter(&self, candidates: Vec<ScoredChunk>, query: &str) -> Vec<ScoredChunk> {
        let matched = AllTermsFilter.filter(candidates.clone(), query);
        if matched.is_empty() { candidates } else { matched }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl CandidateFilter for PassThrough {
    fn name(&self) -> &'static str { "none" }

    fn filter(&self, candidates: Vec<ScoredChunk>, _query: &str) -> Vec<ScoredChunk> { candidates }
}

pub fn filter_from_mode(mode: KeywordFilterMode) -> Box<dyn CandidateFilter> {
    match mode {
        KeywordFilterMode::AllTerms => Box::new(AllTermsFilter),
        KeywordFilterMode::AllTermsOrVector => Box::new(AllTermsOrVectorFilter),
        KeywordFilterMode::Disabled => Box::new(PassThrough),
    }
}
