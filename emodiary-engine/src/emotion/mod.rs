//! Diary emotion classification with a fine-tuned BERT encoder

mod backend;
pub mod bert;
pub mod classifier;
pub mod error;
pub mod hf_download;
pub mod label;
pub mod model_config;
pub mod transform;
pub mod vocab;
pub mod weights;

pub use backend::Backend;
pub use bert::{BertEmotionModel, select_device};
pub use classifier::{EmotionClassifier, LogitsModel, gen_attention_mask};
pub use error::ModelError;
pub use hf_download::{
    download_file, get_config_path, get_config_path_by_id, get_tokenizer_path,
    get_tokenizer_path_by_id,
};
pub use label::{ClassScores, Emotion, EmotionResult, NUM_CLASSES, argmax};
pub use model_config::{ModelFamily, ModelRegistry, SpecialTokenNames, registry};
pub use transform::{EncodedSequence, SequenceTransform, truncate_seq_pair};
pub use vocab::{SpecialToken, SpecialTokens, Vocab};
pub use weights::{WeightFormat, WeightsFile};

#[cfg(test)]
pub(crate) mod test_support {
    use super::model_config::SpecialTokenNames;
    use super::vocab::Vocab;
    use tempfile::TempDir;

    const WORDS: &[&str] = &[
        "[UNK]", "[PAD]", "[CLS]", "[SEP]", "오늘", "정말", "너무", "행복", "했다", "친구", "와",
        "싸웠다", "!",
    ];

    /// Write a whitespace-split WordLevel `tokenizer.json` and load it.
    ///
    /// Ids: `[UNK]`=0, `[PAD]`=1, `[CLS]`=2, `[SEP]`=3, then the words in order.
    pub(crate) fn fixture_vocab() -> (TempDir, Vocab) {
        let dir = TempDir::new().unwrap();
        let vocab: serde_json::Map<String, serde_json::Value> = WORDS
            .iter()
            .enumerate()
            .map(|(id, word)| (word.to_string(), serde_json::Value::from(id)))
            .collect();
        let tokenizer = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer).unwrap()).unwrap();
        let vocab = Vocab::from_file(&path, &SpecialTokenNames::default()).unwrap();
        (dir, vocab)
    }
}
