use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use legalrag_core::config::Settings;
use legalrag_core::data_processor::DataProcessor;
use legalrag_core::traits::{Embedder, LanguageModel};
use legalrag_core::types::{Answer, RetrievalResult};
use legalrag_core::Result;
use legalrag_embed::embedder_from_settings;
use legalrag_llm::OpenAiCompatibleChat;
use legalrag_vector::VectorStore;

use crate::context::assemble;
use crate::filter::filter_from_mode;
use crate::ingest::{ingest_directory, IngestOptions, IngestReport};
use crate::orchestrator::Answerer;
use crate::retriever::HybridRetriever;

/// Owns the store, providers and pipeline stages built from one
/// [`Settings`]. Share it behind an `Arc`.
pub struct RagContext {
    settings: Settings,
    base: PathBuf,
    store: Arc<VectorStore>,
    retriever: Arc<HybridRetriever>,
    answerer: Answerer,
    processor: DataProcessor,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub root: PathBuf,
    pub collection: String,
    pub embedder: String,
    pub dim: usize,
    pub chunks: usize,
}

impl RagContext {
    /// Build providers from `settings`; relative paths resolve against `base`.
    pub async fn open(settings: Settings, base: &Path) -> Result<Self> {
        settings.validate()?;
        let embedder = embedder_from_settings(&settings.embedding, base)?;
        let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiCompatibleChat::from_settings(&settings.llm)?);
        Self::with_providers(settings, base, embedder, llm).await
    }

    pub async fn with_providers(
        settings: Settings,
        base: &Path,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        settings.validate()?;
        let store = Arc::new(
            VectorStore::open(&settings.storage.root_path(base), &settings.storage.collection, embedder).await?,
        );
        let retrieval = &settings.retrieval;
        let retriever = Arc::new(HybridRetriever::new(
            Arc::clone(&store),
            filter_from_mode(retrieval.keyword_filter),
            retrieval.candidate_k,
            retrieval.top_n,
        ));
        let answerer = Answerer::new(Arc::clone(&retriever), llm, retrieval.max_context_chars);
        let processor = DataProcessor::from_settings(&settings.ingest)?;
        Ok(Self { settings, base: base.to_path_buf(), store, retriever, answerer, processor })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn store(&self) -> &Arc<VectorStore> { &self.store }

    /// Ingest `dir`, or the configured upload directory.
    pub async fn ingest(&self, dir: Option<&Path>, rebuild: bool, show_progress: bool) -> Result<IngestReport> {
        let dir = dir.map_or_else(|| self.settings.ingest.upload_path(&self.base), Path::to_path_buf);
        let options = IngestOptions { rebuild, skip_duplicates: self.settings.ingest.skip_duplicates, show_progress };
        ingest_directory(&self.store, &self.processor, &dir, options).await
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(query).await
    }

    /// The context block the model would see for `results`.
    pub fn context_for(&self, results: &RetrievalResult) -> String {
        assemble(results, self.settings.retrieval.max_context_chars)
    }

    pub async fn answer(&self, query: &str) -> Result<Answer> {
        self.answerer.answer(query).await
    }

    pub async fn status(&self) -> Result<CollectionStatus> {
        Ok(CollectionStatus {
            root: self.store.root().to_path_buf(),
            collection: self.store.collection().to_string(),
            embedder: self.store.embedder().embedder_id().to_string(),
            dim: self.store.embedder().dim(),
            chunks: self.store.count().await?,
        })
    }
}
