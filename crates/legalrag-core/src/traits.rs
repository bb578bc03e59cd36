use async_trait::async_trait;

use crate::error::{Error, Result};

/// Maps text to fixed-length vectors. One embedder (identified by
/// `embedder_id`) must be used for the whole life of a collection.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashing:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Compute embeddings for a batch of texts, one vector per text, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(Error::EmbeddingCountMismatch { texts: 1, vectors: n }),
        }
    }
}

/// A text-generation backend. Treated as a black box that may time out or be
/// rate limited.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}
