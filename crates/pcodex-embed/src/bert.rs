//! Sentence embeddings from a local BERT checkpoint (all-MiniLM-L6-v2 family).
//!
//! The model directory must hold `config.json`, `tokenizer.json` and either
//! `model.safetensors` or `pytorch_model.bin`. Output is the attention-masked
//! mean of the last hidden state, L2-normalized.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use pcodex_core::config::{expand_path, EmbeddingConfig};
use pcodex_core::{Embedder, Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{configure, tokenize_batch};

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    batch_size: usize,
    id: String,
}

impl BertEmbedder {
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let model_dir = resolve_model_dir(&config.model_dir)?;
        let device = select_device(config.cpu_only);
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::model(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display())))?;
        configure(&mut tokenizer, config.max_len)?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| Error::model(format!("failed to read {}: {e}", config_path.display())))?;
        let bert_config: BertConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::model(format!("invalid model config {}: {e}", config_path.display())))?;
        let dim = hidden_size(&raw)?;

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &bert_config).map_err(Error::model)?;

        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "bert".to_string());
        let id = format!("bert:{name}:d{dim}");
        info!(%id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, batch_size: config.batch_size.max(1), id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(Error::model)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(Error::model)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(Error::model)?;
        let rows: Vec<Vec<f32>> = pooled
            .to_dtype(DType::F32)
            .and_then(|t| t.to_device(&Device::Cpu))
            .and_then(|t| t.to_vec2())
            .map_err(Error::model)?;
        if rows.iter().any(|r| r.len() != self.dim) {
            return Err(Error::model(format!("model returned vectors that are not {}-dimensional", self.dim)));
        }
        Ok(rows)
    }
}

impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(batch)?);
        }
        let elapsed = start.elapsed();
        debug!(texts = texts.len(), ms = elapsed.as_millis() as u64, "embedded batch");
        if texts.len() == 1 && elapsed.as_millis() > 500 {
            warn!(ms = elapsed.as_millis() as u64, "slow single embedding");
        }
        Ok(out)
    }
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    let dir = expand_path(configured);
    if dir.join("config.json").is_file() {
        return Ok(dir);
    }
    Err(Error::ModelUnavailable(format!("no model found at {} (expected config.json, tokenizer.json and weights)", dir.display())))
}

fn hidden_size(raw_config: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(raw_config).map_err(Error::model)?;
    value
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| Error::model("model config has no hidden_size"))
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.is_file() {
        debug!(path = %safetensors.display(), "loading safetensors weights");
        return candle_core::safetensors::load(&safetensors, device).map_err(Error::model);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.is_file() {
        debug!(path = %pickle.display(), "loading pytorch weights");
        let weights = candle_core::pickle::read_all(&pickle).map_err(Error::model)?;
        return Ok(weights.into_iter().collect());
    }
    Err(Error::ModelUnavailable(format!("no weights in {}", model_dir.display())))
}
