//! Emotion classifier: attention masking and the decision rule
//!
//! The tensor backend sits behind [`LogitsModel`]; this module only turns
//! logits into an [`EmotionResult`].

use super::error::ModelError;
use super::label::{EmotionResult, NUM_CLASSES};
use super::transform::EncodedSequence;
type Result<T> = super::error::Result<T>;

/// A model producing one row of emotion logits per encoded sequence.
pub trait LogitsModel: Send + Sync {
    /// Forward pass over a batch. Returns one logit row per input, in order.
    fn logits(&self, batch: &[EncodedSequence]) -> Result<Vec<[f32; NUM_CLASSES]>>;

    /// Human-readable model name for logs and `/health`
    fn display_name(&self) -> &str;
}

/// Build a flattened `[batch, seq_len]` attention mask.
///
/// Position `i` of row `b` is 1 iff `i < valid_lengths[b]`.
pub fn gen_attention_mask(seq_len: usize, valid_lengths: &[usize]) -> Vec<u32> {
    let mut mask = vec![0u32; seq_len * valid_lengths.len()];
    for (row, &valid) in mask.chunks_mut(seq_len.max(1)).zip(valid_lengths) {
        let valid = valid.min(row.len());
        row[..valid].fill(1);
    }
    mask
}

/// Emotion classifier over a loaded [`LogitsModel`]
pub struct EmotionClassifier {
    model: Box<dyn LogitsModel>,
}

impl EmotionClassifier {
    pub fn new(model: impl LogitsModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    /// Classify a single encoded sequence.
    pub fn classify(&self, encoded: &EncodedSequence) -> Result<EmotionResult> {
        let mut results = self.classify_batch(std::slice::from_ref(encoded))?;
        results
            .pop()
            .ok_or_else(|| ModelError::Inference("model returned no logits".into()))
    }

    /// Classify a batch of encoded sequences. All sequences must share one length.
    pub fn classify_batch(&self, batch: &[EncodedSequence]) -> Result<Vec<EmotionResult>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.model.logits(batch)?;
        if rows.len() != batch.len() {
            return Err(ModelError::Inference(
                format!(
                    "model returned {} logit rows for a batch of {}",
                    rows.len(),
                    batch.len()
                )
                .into(),
            ));
        }
        Ok(rows.iter().map(EmotionResult::from_logits).collect())
    }

    pub fn model_display_name(&self) -> &str {
        self.model.display_name()
    }
}
