//! Embedding providers.
//!
//! - [`HashingEmbedder`]: deterministic, offline, no model files
//! - [`LocalEmbedder`]: XLM-RoBERTa checkpoint run with candle
//! - [`RemoteEmbedder`]: OpenAI-compatible HTTP endpoint
//!
//! Use [`embedder_from_settings`] to build the configured one.

use std::path::Path;
use std::sync::Arc;

use legalrag_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use legalrag_core::traits::Embedder;
use legalrag_core::Result;

pub mod device;
pub mod hashing;
pub mod local;
pub mod pool;
pub mod remote;
pub mod tokenize;

pub use hashing::HashingEmbedder;
pub use local::LocalEmbedder;
pub use pool::masked_mean_l2;
pub use remote::RemoteEmbedder;

/// Build the embedder selected by `settings.provider`. Relative model paths
/// resolve against `base`.
pub fn embedder_from_settings(settings: &EmbeddingSettings, base: &Path) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbedder::new(settings.dim)?),
        EmbeddingProviderKind::Local => Arc::new(LocalEmbedder::load(&settings.model_path(base), settings.max_len)?),
        EmbeddingProviderKind::Openai => Arc::new(RemoteEmbedder::from_settings(settings)?),
    };
    tracing::info!(embedder = embedder.embedder_id(), dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}
