//! TOML-based model configuration
//!
//! Supported classifier families are defined in `models.toml` at the crate root.
//! This module deserializes that file and provides a global registry for lookup.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Top-level config parsed from `models.toml`
#[derive(Debug, Deserialize)]
pub struct ModelRegistry {
    /// Default family id (e.g. "kobert-diary-7")
    pub default_model: String,
    /// Model families keyed by id
    pub models: HashMap<String, ModelFamily>,
}

/// A classifier family: one pretrained encoder repo plus head shape
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFamily {
    pub repo_id: String,
    pub display_name: String,
    /// Tokenizer filename in the HuggingFace repo, if the repo ships one
    #[serde(default)]
    pub tokenizer_file: Option<String>,
    /// BERT config filename in the HuggingFace repo
    pub config_file: String,
    /// Width of the classification head
    pub num_labels: usize,
    /// Dropout rate used at training time (never applied at inference)
    #[serde(default)]
    pub dropout: Option<f32>,
    pub special_tokens: SpecialTokenNames,
}

/// Surface strings of the special tokens in the tokenizer vocabulary
#[derive(Debug, Clone, Deserialize)]
pub struct SpecialTokenNames {
    pub cls: String,
    pub sep: String,
    pub pad: String,
    pub unk: String,
}

impl Default for SpecialTokenNames {
    fn default() -> Self {
        Self {
            cls: "[CLS]".to_string(),
            sep: "[SEP]".to_string(),
            pad: "[PAD]".to_string(),
            unk: "[UNK]".to_string(),
        }
    }
}

static REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

/// Return the global model registry, parsed once from the embedded `models.toml`.
pub fn registry() -> &'static ModelRegistry {
    REGISTRY.get_or_init(|| {
        let toml_str = include_str!("../../models.toml");
        toml::from_str(toml_str).expect("Failed to parse models.toml")
    })
}

impl ModelRegistry {
    /// Look up a family by its id.
    pub fn find(&self, model_id: &str) -> Option<&ModelFamily> {
        self.models.get(model_id)
    }

    /// Return the default family.
    pub fn default_family(&self) -> Option<&ModelFamily> {
        self.find(&self.default_model)
    }

    /// All family ids, sorted.
    pub fn all_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.models.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
