use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use legalrag_core::config::Settings;
use legalrag_core::traits::{Embedder, LanguageModel};
use legalrag_core::{Error, Result};
use legalrag_embed::HashingEmbedder;
use legalrag_hybrid::{RagContext, NO_EVIDENCE_ANSWER};

/// Records prompts and replies with a fixed answer.
#[derive(Default)]
struct RecordingModel {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_id(&self) -> &str { "recording" }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Oral evidence must in all cases be direct [1].".to_string())
    }
}

struct RateLimitedModel;

#[async_trait]
impl LanguageModel for RateLimitedModel {
    fn model_id(&self) -> &str { "rate-limited" }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::LanguageModel { message: "429 Too Many Requests".into(), retryable: true })
    }
}

/// Same identity as the hashing embedder but loses the last vector.
struct DroppingEmbedder(HashingEmbedder);

#[async_trait]
impl Embedder for DroppingEmbedder {
    fn embedder_id(&self) -> &str { self.0.embedder_id() }
    fn dim(&self) -> usize { self.0.dim() }
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut v = self.0.embed_documents(texts).await?;
        v.pop();
        Ok(v)
    }
}

fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.storage.root = root.join("index").to_string_lossy().to_string();
    settings.ingest.upload_dir = root.join("uploads").to_string_lossy().to_string();
    settings
}

fn hashing() -> Arc<dyn Embedder> {
    Arc::new(HashingEmbedder::new(384).unwrap())
}

async fn context_with(tmp: &TempDir, settings: Settings, llm: Arc<dyn LanguageModel>) -> RagContext {
    RagContext::with_providers(settings, tmp.path(), hashing(), llm).await.expect("context")
}

fn write_upload(tmp: &TempDir, name: &str, text: &str) {
    let dir = tmp.path().join("uploads");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), text).unwrap();
}

#[tokio::test]
async fn single_sentence_document_end_to_end() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let llm = Arc::new(RecordingModel::default());
    let ctx = context_with(&tmp, settings_for(tmp.path()), llm.clone()).await;

    let report = ctx.ingest(None, false, false).await.expect("ingest");
    assert_eq!(report.chunks_added, 1);
    assert_eq!(report.collection_count, 1);

    let results = ctx.retrieve("oral evidence").await.expect("retrieve");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.text, "Oral evidence must be direct.");
    let context = ctx.context_for(&results);
    assert!(context.contains("Oral evidence must be direct."));
    assert!(context.contains("evidence_act.txt"));

    let answer = ctx.answer("oral evidence").await.expect("answer");
    assert!(answer.grounded);
    assert_eq!(answer.text, "Oral evidence must in all cases be direct [1].");
    assert_eq!(answer.supporting_chunks.len(), 1);
    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("[1] evidence_act.txt\nOral evidence must be direct."));
    assert!(prompts[0].contains("oral evidence"));
}

#[tokio::test]
async fn empty_collection_gives_fixed_answer_without_model_call() {
    let tmp = TempDir::new().unwrap();
    let llm = Arc::new(RecordingModel::default());
    let ctx = context_with(&tmp, settings_for(tmp.path()), llm.clone()).await;

    assert!(ctx.retrieve("anything at all").await.unwrap().is_empty());
    let answer = ctx.answer("anything at all").await.unwrap();

    assert_eq!(answer.text, NO_EVIDENCE_ANSWER);
    assert!(!answer.grounded);
    assert!(answer.supporting_chunks.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_keyword_match_also_skips_the_model() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "crpc.txt", "Section 125 provides for maintenance of wives and children.");
    let llm = Arc::new(RecordingModel::default());
    let ctx = context_with(&tmp, settings_for(tmp.path()), llm.clone()).await;
    ctx.ingest(None, false, false).await.unwrap();

    let answer = ctx.answer("section 200").await.unwrap();
    assert!(!answer.grounded);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_failures_propagate_as_retryable() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RateLimitedModel)).await;
    ctx.ingest(None, false, false).await.unwrap();

    let err = ctx.answer("oral evidence").await.unwrap_err();
    assert!(err.is_retryable(), "got {err}");
}

#[tokio::test]
async fn retrieval_is_capped_at_top_n() {
    let tmp = TempDir::new().unwrap();
    let mut settings = settings_for(tmp.path());
    settings.ingest.chunk_size = 40;
    settings.ingest.chunk_overlap = 0;
    let text: String = (1..=8).map(|i| format!("Clause {i} binds the parties.\n\n")).collect();
    write_upload(&tmp, "contract.txt", &text);
    let ctx = context_with(&tmp, settings, Arc::new(RecordingModel::default())).await;

    let report = ctx.ingest(None, false, false).await.unwrap();
    assert_eq!(report.chunks_added, 8);
    let results = ctx.retrieve("clause").await.unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn unsupported_and_broken_files_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "ipc.txt", "Whoever commits murder shall be punished.");
    write_upload(&tmp, "notes.docx", "PK");
    write_upload(&tmp, "scan.pdf", "%PDF-1.4 truncated");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;

    let report = ctx.ingest(None, false, false).await.unwrap();

    assert_eq!(report.files_seen, 3);
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().any(|s| s.path.ends_with("notes.docx")));
    assert!(report.skipped.iter().any(|s| s.path.ends_with("scan.pdf")));
}

#[tokio::test]
async fn missing_upload_directory_is_an_input_error() {
    let tmp = TempDir::new().unwrap();
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;
    let err = ctx.ingest(None, false, false).await.unwrap_err();
    assert!(matches!(err, Error::IngestionInput { .. }));
}

#[tokio::test]
async fn reingestion_accumulates_unless_deduplicated_or_rebuilt() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;
    ctx.ingest(None, false, false).await.unwrap();
    let second = ctx.ingest(None, false, false).await.unwrap();
    assert_eq!(second.collection_count, 2);

    let rebuilt = ctx.ingest(None, true, false).await.unwrap();
    assert_eq!(rebuilt.collection_count, 1);

    let mut settings = settings_for(tmp.path());
    settings.ingest.skip_duplicates = true;
    let dedup = context_with(&tmp, settings, Arc::new(RecordingModel::default())).await;
    let report = dedup.ingest(None, false, false).await.unwrap();
    assert_eq!(report.chunks_added, 0);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.collection_count, 1);
}

#[tokio::test]
async fn embedding_count_mismatch_aborts_ingestion() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let embedder: Arc<dyn Embedder> = Arc::new(DroppingEmbedder(HashingEmbedder::new(384).unwrap()));
    let ctx = RagContext::with_providers(settings_for(tmp.path()), tmp.path(), embedder, Arc::new(RecordingModel::default()))
        .await
        .unwrap();

    let err = ctx.ingest(None, false, false).await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingCountMismatch { texts: 1, vectors: 0 }));
    assert_eq!(ctx.status().await.unwrap().chunks, 0);
}

#[tokio::test]
async fn status_reports_collection_and_embedder() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;
    ctx.ingest(None, false, false).await.unwrap();

    let status = ctx.status().await.unwrap();
    assert_eq!(status.collection, "legal_documents");
    assert_eq!(status.embedder, "hashing:xxh64:d384");
    assert_eq!(status.chunks, 1);
}

#[tokio::test]
async fn failed_rebuild_keeps_the_previous_collection() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "evidence_act.txt", "Oral evidence must be direct.");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;
    ctx.ingest(None, false, false).await.unwrap();

    let faulty: Arc<dyn Embedder> = Arc::new(DroppingEmbedder(HashingEmbedder::new(384).unwrap()));
    let rebuilding =
        RagContext::with_providers(settings_for(tmp.path()), tmp.path(), faulty, Arc::new(RecordingModel::default()))
            .await
            .unwrap();
    let err = rebuilding.ingest(None, true, false).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingCountMismatch { .. }), "got {err}");

    assert_eq!(ctx.status().await.unwrap().chunks, 1);
    let results = ctx.retrieve("oral evidence").await.unwrap();
    assert_eq!(results[0].chunk.text, "Oral evidence must be direct.");

    // The collection can still be rebuilt afterwards.
    let rebuilt = ctx.ingest(None, true, false).await.unwrap();
    assert_eq!(rebuilt.collection_count, 1);
}

#[tokio::test]
async fn rebuild_replaces_previous_contents() {
    let tmp = TempDir::new().unwrap();
    write_upload(&tmp, "old.txt", "Repealed provisions of the old code.");
    let ctx = context_with(&tmp, settings_for(tmp.path()), Arc::new(RecordingModel::default())).await;
    ctx.ingest(None, false, false).await.unwrap();

    fs::remove_file(tmp.path().join("uploads/old.txt")).unwrap();
    write_upload(&tmp, "new.txt", "Oral evidence must be direct.");
    let report = ctx.ingest(None, true, false).await.unwrap();

    assert_eq!(report.collection_count, 1);
    let results = ctx.retrieve("oral evidence").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.metadata.source, "new.txt");
    assert!(ctx.retrieve("repealed").await.unwrap().is_empty());
}
