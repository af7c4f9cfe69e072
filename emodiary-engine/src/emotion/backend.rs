//! Resolve classifier resources and load them into a ready classifier

use std::path::{Path, PathBuf};

use candle_core::Device;

use super::bert::BertEmotionModel;
use super::classifier::EmotionClassifier;
use super::error::ModelError;
use super::hf_download::{get_config_path, get_tokenizer_path};
use super::label::NUM_CLASSES;
use super::model_config::{ModelFamily, registry};
use super::vocab::Vocab;
type Result<T> = super::error::Result<T>;

/// Where the classifier's tokenizer, encoder config and weights come from.
///
/// Tokenizer and config default to the family's HuggingFace repository;
/// local paths override the download.
#[derive(Debug, Clone)]
pub struct Backend {
    family: ModelFamily,
    weights_path: PathBuf,
    tokenizer_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl Backend {
    pub fn new(family: ModelFamily, weights_path: impl Into<PathBuf>) -> Result<Self> {
        if family.num_labels != NUM_CLASSES {
            return Err(ModelError::ConfigLoad(
                format!(
                    "family '{}' declares {} labels, classifier head has {}",
                    family.display_name, family.num_labels, NUM_CLASSES
                )
                .into(),
            ));
        }
        Ok(Self {
            family,
            weights_path: weights_path.into(),
            tokenizer_path: None,
            config_path: None,
        })
    }

    /// Look up a family id in the global registry.
    ///
    /// E.g. `Backend::from_family_id("kobert-diary-7", "best_model.pt")`
    pub fn from_family_id(family_id: &str, weights_path: impl Into<PathBuf>) -> Result<Self> {
        let family = registry()
            .find(family_id)
            .ok_or_else(|| ModelError::UnknownModel(family_id.to_string()))?;
        Self::new(family.clone(), weights_path)
    }

    pub fn with_tokenizer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokenizer_path = Some(path.into());
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn family(&self) -> &ModelFamily {
        &self.family
    }

    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    /// Load only the vocabulary (no weights needed).
    pub fn load_vocab(&self) -> Result<Vocab> {
        let path = match &self.tokenizer_path {
            Some(p) => p.clone(),
            None => get_tokenizer_path(&self.family)?,
        };
        Vocab::from_file(path, &self.family.special_tokens)
    }

    /// Load vocabulary, encoder config and weights.
    ///
    /// Weights are checked before anything is downloaded, so a missing or
    /// truncated file fails fast.
    pub fn load(&self, device: &Device) -> Result<(EmotionClassifier, Vocab)> {
        super::weights::inspect(&self.weights_path)?;
        let vocab = self.load_vocab()?;
        let config_path = match &self.config_path {
            Some(p) => p.clone(),
            None => get_config_path(&self.family)?,
        };
        let model = BertEmotionModel::load(
            &config_path,
            &self.weights_path,
            self.family.dropout,
            device,
        )?;
        Ok((EmotionClassifier::new(model), vocab))
    }
}
