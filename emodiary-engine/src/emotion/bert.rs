//! BERT emotion classifier on candle
//!
//! Layout of the fine-tuned state dict:
//! `bert.embeddings.*`, `bert.encoder.*` → `bert.pooler.dense` (tanh over
//! `[CLS]`) → `layer_norm` → dropout → `classifier` (7 logits).

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Dropout, LayerNorm, Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};

use super::classifier::{LogitsModel, gen_attention_mask};
use super::error::ModelError;
use super::label::NUM_CLASSES;
use super::transform::EncodedSequence;
use super::weights;
type Result<T> = super::error::Result<T>;

const LAYER_NORM_EPS: f64 = 1e-5;

/// Pick the compute device: CUDA when built with the `cuda` feature and a GPU
/// is present, CPU otherwise.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                tracing::info!("Using CUDA device 0");
                return device;
            }
            Err(e) => tracing::warn!("CUDA unavailable ({e}), falling back to CPU"),
        }
    }
    Device::Cpu
}

/// Read a HuggingFace `config.json` for the BERT encoder.
pub fn load_bert_config<P: AsRef<Path>>(path: P) -> Result<BertConfig> {
    let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| ModelError::ConfigLoad(e.into()))?;
    serde_json::from_str(&raw).map_err(|e| ModelError::ConfigLoad(e.into()))
}

pub struct BertEmotionModel {
    bert: BertModel,
    pooler: Linear,
    layer_norm: LayerNorm,
    dropout: Option<Dropout>,
    classifier: Linear,
    device: Device,
    display_name: String,
}

impl BertEmotionModel {
    /// Build the model from a var builder rooted at the state dict top level.
    pub fn from_var_builder(
        vb: VarBuilder,
        config: &BertConfig,
        dropout: Option<f32>,
        display_name: impl Into<String>,
    ) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let bert = BertModel::load(vb.pp("bert"), config)?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let layer_norm = candle_nn::layer_norm(hidden, LAYER_NORM_EPS, vb.pp("layer_norm"))?;
        let classifier = candle_nn::linear(hidden, NUM_CLASSES, vb.pp("classifier"))?;
        Ok(Self {
            bert,
            pooler,
            layer_norm,
            dropout: dropout.map(Dropout::new),
            classifier,
            device: vb.device().clone(),
            display_name: display_name.into(),
        })
    }

    /// Load encoder config and fine-tuned weights from disk.
    ///
    /// The weights file is validated first (missing, empty, truncated); any
    /// failure to materialize the expected tensors is reported as corruption.
    pub fn load<C: AsRef<Path>, W: AsRef<Path>>(
        config_path: C,
        weights_path: W,
        dropout: Option<f32>,
        device: &Device,
    ) -> Result<Self> {
        let config = load_bert_config(config_path)?;
        let file = weights::inspect(weights_path)?;
        let vb = weights::var_builder(&file, device)?;
        let display_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        let model = Self::from_var_builder(vb, &config, dropout, display_name).map_err(|e| {
            ModelError::WeightsCorrupted {
                path: file.path.clone(),
                source: e.into(),
            }
        })?;
        tracing::info!(
            "Emotion model loaded: {} (hidden={}, layers={})",
            model.display_name,
            config.hidden_size,
            config.num_hidden_layers
        );
        Ok(model)
    }

    fn forward(&self, batch: &[EncodedSequence]) -> candle_core::Result<Tensor> {
        let seq_len = batch.iter().map(EncodedSequence::len).max().unwrap_or(0);
        let mut ids = Vec::with_capacity(batch.len() * seq_len);
        let mut segments = Vec::with_capacity(batch.len() * seq_len);
        for seq in batch {
            if seq.len() != seq_len {
                candle_core::bail!(
                    "batch sequences must share one length (got {} and {})",
                    seq.len(),
                    seq_len
                );
            }
            ids.extend_from_slice(&seq.token_ids);
            segments.extend_from_slice(&seq.segment_ids);
        }
        let valid: Vec<usize> = batch.iter().map(|s| s.valid_length).collect();
        let shape = (batch.len(), seq_len);

        let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
        let token_type_ids = Tensor::from_vec(segments, shape, &self.device)?;
        let attention_mask =
            Tensor::from_vec(gen_attention_mask(seq_len, &valid), shape, &self.device)?;

        let hidden = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let normed = self.layer_norm.forward(&pooled)?;
        let out = match &self.dropout {
            Some(dropout) => dropout.forward(&normed, false)?,
            None => normed,
        };
        self.classifier.forward(&out)?.to_dtype(DType::F32)
    }
}

impl LogitsModel for BertEmotionModel {
    fn logits(&self, batch: &[EncodedSequence]) -> Result<Vec<[f32; NUM_CLASSES]>> {
        let rows: Vec<Vec<f32>> = self.forward(batch)?.to_vec2()?;
        rows.into_iter()
            .map(|row| {
                <[f32; NUM_CLASSES]>::try_from(row).map_err(|row| {
                    ModelError::Inference(
                        format!("expected {NUM_CLASSES} logits, got {}", row.len()).into(),
                    )
                })
            })
            .collect()
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
}
