//! Subword tokenizer and vocabulary adapter
//!
//! Wraps a HuggingFace `tokenizer.json` and resolves the special tokens the
//! sequence transform needs. Tokenization never adds special tokens itself;
//! `[CLS]`/`[SEP]` placement belongs to [`super::transform`].

use std::path::Path;

use super::error::ModelError;
use super::model_config::SpecialTokenNames;
use crate::text::normalize_nfkc;
type Result<T> = super::error::Result<T>;

/// A special token and its vocabulary id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialToken {
    pub token: String,
    pub id: u32,
}

/// Special tokens required to assemble a classifier input
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    pub cls: SpecialToken,
    pub sep: SpecialToken,
    pub pad: SpecialToken,
    pub unk: SpecialToken,
}

/// Tokenizer plus vocabulary lookup
pub struct Vocab {
    tokenizer: tokenizers::Tokenizer,
    special: SpecialTokens,
}

/// Load an external HuggingFace tokenizer from a `tokenizer.json` file.
fn load_tokenizer<P: AsRef<Path>>(path: P) -> Result<tokenizers::Tokenizer> {
    let mut tokenizer =
        tokenizers::Tokenizer::from_file(path.as_ref()).map_err(ModelError::TokenizerLoad)?;
    // Padding and truncation are handled by the sequence transform
    tokenizer.with_padding(None);
    tokenizer.with_truncation(None).ok();
    Ok(tokenizer)
}

impl Vocab {
    /// Load a vocabulary from a `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P, names: &SpecialTokenNames) -> Result<Self> {
        let tokenizer = load_tokenizer(path)?;
        Self::from_tokenizer(tokenizer, names)
    }

    /// Wrap an already constructed tokenizer.
    ///
    /// Fails if any of the special tokens is absent from the vocabulary.
    pub fn from_tokenizer(tokenizer: tokenizers::Tokenizer, names: &SpecialTokenNames) -> Result<Self> {
        let resolve = |token: &str| -> Result<SpecialToken> {
            let id = tokenizer
                .token_to_id(token)
                .ok_or_else(|| ModelError::MissingSpecialToken(token.to_string()))?;
            Ok(SpecialToken {
                token: token.to_string(),
                id,
            })
        };
        let special = SpecialTokens {
            cls: resolve(&names.cls)?,
            sep: resolve(&names.sep)?,
            pad: resolve(&names.pad)?,
            unk: resolve(&names.unk)?,
        };
        tracing::debug!(
            "Vocabulary loaded: size={}, cls={}, sep={}, pad={}, unk={}",
            tokenizer.get_vocab_size(true),
            special.cls.id,
            special.sep.id,
            special.pad.id,
            special.unk.id
        );
        Ok(Self {
            tokenizer,
            special,
        })
    }

    /// Split NFKC-normalized text into subword tokens without adding special tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let encoding = self
            .tokenizer
            .encode(normalize_nfkc(text), false)
            .map_err(ModelError::Inference)?;
        Ok(encoding.get_tokens().to_vec())
    }

    /// Look up a token id; unknown tokens map to the unknown-token id.
    pub fn token_to_id(&self, token: &str) -> u32 {
        self.tokenizer
            .token_to_id(token)
            .unwrap_or(self.special.unk.id)
    }

    /// Convert a token list to ids.
    pub fn convert_tokens_to_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        tokens.iter().map(|t| self.token_to_id(t.as_ref())).collect()
    }

    /// Look up the surface string of an id, if it exists.
    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.tokenizer.id_to_token(id)
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    /// Vocabulary size including added tokens
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
