//! Error types for emotion classification

use std::path::PathBuf;

/// Errors that can occur while loading or running the emotion classifier.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown model family: '{0}'")]
    UnknownModel(String),

    #[error("download failed")]
    Download(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("repository '{0}' ships no tokenizer.json; set [model].tokenizer_path to a converted local file")]
    NoHubTokenizer(String),

    #[error("tokenizer load failed")]
    TokenizerLoad(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("special token '{0}' is missing from the vocabulary")]
    MissingSpecialToken(String),

    #[error("model config load failed")]
    ConfigLoad(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("weights file not found: {0}")]
    WeightsMissing(PathBuf),

    #[error("weights file is empty: {0}")]
    WeightsEmpty(PathBuf),

    #[error("weights file is suspiciously small ({size} bytes): {path}")]
    WeightsTruncated { path: PathBuf, size: u64 },

    #[error("weights file is corrupted or incomplete: {path}")]
    WeightsCorrupted {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("max sequence length must be at least 3, got {0}")]
    SequenceLength(usize),

    #[error("inference failed")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<candle_core::Error> for ModelError {
    fn from(e: candle_core::Error) -> Self {
        ModelError::Inference(e.into())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
