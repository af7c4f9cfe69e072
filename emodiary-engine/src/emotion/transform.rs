//! Fixed-length sequence encoding for the BERT classifier
//!
//! Turns one or two raw text segments into `(token_ids, valid_length, segment_ids)`:
//!
//! ```text
//! [CLS] a1 a2 .. [SEP] b1 b2 .. [SEP] [PAD] [PAD] ..
//!   0    0  0  ..  0    1  1  ..  1     0     0   ..
//! ```

use super::error::ModelError;
use super::vocab::Vocab;
use crate::text::normalize_segment;
type Result<T> = super::error::Result<T>;

/// Positions reserved for `[CLS]` and one `[SEP]`
const SINGLE_RESERVED: usize = 2;
/// Positions reserved for `[CLS]` and two `[SEP]`
const PAIR_RESERVED: usize = 3;

/// Encoded classifier input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
    /// Token ids, padded to `max_seq_length` when padding is enabled
    pub token_ids: Vec<u32>,
    /// Number of non-padding positions
    pub valid_length: usize,
    /// Segment id per position (0 = first text, 1 = second text, padding = 0)
    pub segment_ids: Vec<u32>,
}

impl EncodedSequence {
    /// Total encoded length (including padding)
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }
}

/// Trim a token pair in place until the combined length fits `max_length`.
///
/// One token is popped from the end of the longer list per step. When both
/// lists have the same length, the first list is trimmed.
pub fn truncate_seq_pair<T>(tokens_a: &mut Vec<T>, tokens_b: &mut Vec<T>, max_length: usize) {
    while tokens_a.len() + tokens_b.len() > max_length {
        if tokens_a.len() >= tokens_b.len() {
            tokens_a.pop();
        } else {
            tokens_b.pop();
        }
    }
}

/// BERT sentence transform
#[derive(Debug, Clone)]
pub struct SequenceTransform {
    max_seq_length: usize,
    pad: bool,
    pair: bool,
}

impl SequenceTransform {
    pub const DEFAULT_MAX_SEQ_LENGTH: usize = 128;

    /// Create a transform.
    ///
    /// `max_seq_length` must leave room for `[CLS]` and two `[SEP]` tokens.
    pub fn new(max_seq_length: usize, pad: bool, pair: bool) -> Result<Self> {
        if max_seq_length < PAIR_RESERVED {
            return Err(ModelError::SequenceLength(max_seq_length));
        }
        Ok(Self {
            max_seq_length,
            pad,
            pair,
        })
    }

    /// Padded single-segment transform, the configuration used for classification.
    pub fn single(max_seq_length: usize) -> Result<Self> {
        Self::new(max_seq_length, true, false)
    }

    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }

    /// Tokenize and encode one or two text segments.
    ///
    /// A missing primary text encodes as the empty string. The secondary text
    /// is ignored unless the transform was built with `pair = true`; an empty
    /// secondary text counts as absent.
    pub fn encode(
        &self,
        vocab: &Vocab,
        primary: Option<&str>,
        secondary: Option<&str>,
    ) -> Result<EncodedSequence> {
        let tokens_a = vocab.tokenize(normalize_segment(primary))?;
        let tokens_b = match secondary {
            Some(text) if self.pair && !text.is_empty() => Some(vocab.tokenize(text)?),
            _ => None,
        };
        Ok(self.encode_tokens(vocab, tokens_a, tokens_b))
    }

    /// Truncate, assemble, convert and pad already tokenized segments.
    pub fn encode_tokens(
        &self,
        vocab: &Vocab,
        mut tokens_a: Vec<String>,
        tokens_b: Option<Vec<String>>,
    ) -> EncodedSequence {
        let mut tokens_b = tokens_b.filter(|b| !b.is_empty());

        match tokens_b.as_mut() {
            Some(b) => truncate_seq_pair(&mut tokens_a, b, self.max_seq_length - PAIR_RESERVED),
            None => tokens_a.truncate(self.max_seq_length - SINGLE_RESERVED),
        }

        let special = vocab.special_tokens();
        let mut token_ids = Vec::with_capacity(self.max_seq_length);
        token_ids.push(special.cls.id);
        token_ids.extend(vocab.convert_tokens_to_ids(&tokens_a));
        token_ids.push(special.sep.id);
        let mut segment_ids = vec![0u32; token_ids.len()];

        if let Some(b) = tokens_b {
            token_ids.extend(vocab.convert_tokens_to_ids(&b));
            token_ids.push(special.sep.id);
            segment_ids.resize(token_ids.len(), 1);
        }

        let valid_length = token_ids.len();

        if self.pad {
            token_ids.resize(self.max_seq_length, special.pad.id);
            segment_ids.resize(self.max_seq_length, 0);
        }

        EncodedSequence {
            token_ids,
            valid_length,
            segment_ids,
        }
    }
}
