//! Sentence embeddings from a local XLM-RoBERTa checkpoint (BGE-M3 layout):
//! `tokenizer.json`, `config.json` and `pytorch_model.bin` in one directory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use legalrag_core::traits::Embedder;
use legalrag_core::Result;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{model_error, tokenize_batch_on_device};

const BATCH_SIZE: usize = 16;
/// XLM-RoBERTa `<pad>`.
const DEFAULT_PAD_ID: u32 = 1;

pub struct LocalEmbedder {
    inner: Arc<LocalModel>,
    id: String,
    dim: usize,
}

struct LocalModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
}

impl LocalEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            model_error(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))
        })?;

        let raw_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config).map_err(model_error)?;
        let meta: serde_json::Value = serde_json::from_str(&raw_config).map_err(model_error)?;
        let dim = meta["hidden_size"]
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| model_error("config.json has no hidden_size"))?;
        let pad_id = meta["pad_token_id"].as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(DEFAULT_PAD_ID);

        let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin")).map_err(model_error)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb).map_err(model_error)?;

        let name = model_dir.file_name().map_or_else(|| "model".to_string(), |n| n.to_string_lossy().to_string());
        info!(dim, "embedding model loaded");
        Ok(Self {
            inner: Arc::new(LocalModel { model, tokenizer, device, max_len, pad_id }),
            id: format!("local:{name}:d{dim}"),
            dim,
        })
    }
}

impl LocalModel {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let (input_ids, attention_mask) =
                tokenize_batch_on_device(&self.tokenizer, batch, self.max_len, self.pad_id, &self.device)?;
            let token_type_ids =
                Tensor::zeros((batch.len(), self.max_len), DType::I64, &self.device).map_err(model_error)?;
            let hidden = self
                .model
                .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
                .map_err(model_error)?;
            let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(model_error)?;
            let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu).and_then(|t| t.to_vec2()).map_err(model_error)?;
            out.extend(rows);
        }
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed_batch(&texts)).await.map_err(model_error)?
    }
}
