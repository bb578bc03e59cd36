//! OpenAI-compatible `/embeddings` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use legalrag_core::config::EmbeddingSettings;
use legalrag_core::traits::Embedder;
use legalrag_core::{is_retryable_status, Error, Result};

pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: &str, dim: usize, timeout: Duration) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be greater than 0".into()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(transport_error)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            dim,
            id: format!("openai:{model}:d{dim}"),
        })
    }

    /// API key: `embedding.api_key`, else `OPENAI_API_KEY`.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = if settings.api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            settings.api_key.clone()
        };
        Self::new(
            &settings.base_url,
            &settings.model,
            &api_key,
            settings.dim,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let mut req = self.client.post(&url).json(&EmbeddingRequest { model: &self.model, input: texts });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProvider {
                message: format!("{} API error {status}: {body}", self.model),
                retryable: is_retryable_status(status.as_u16()),
            });
        }
        let mut parsed: EmbeddingResponse = resp.json().await.map_err(transport_error)?;
        if parsed.data.len() != texts.len() {
            return Err(Error::EmbeddingCountMismatch { texts: texts.len(), vectors: parsed.data.len() });
        }
        parsed.data.sort_by_key(|item| item.index);
        // Sorted indices must be exactly 0..n.
        if let Some((position, item)) = parsed.data.iter().enumerate().find(|(i, item)| item.index != *i) {
            return Err(Error::EmbeddingProvider {
                message: format!("{} returned index {} at position {position}; expected indices 0..{}", self.model, item.index, texts.len()),
                retryable: false,
            });
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|item| item.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        tracing::debug!(texts = texts.len(), model = %self.model, "remote embeddings received");
        Ok(vectors)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::EmbeddingProvider { message: e.to_string(), retryable: e.is_timeout() || e.is_connect() }
}
