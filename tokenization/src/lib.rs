//! Shared tokenization layer for the task pipelines
//!
//! Wraps HuggingFace's fast tokenizers and exposes what the post-processing
//! layer needs: token ids, byte offsets into the original text, the
//! special-token mask, word ids and sequence ids for text pairs.

pub mod error;

use std::path::Path;
pub use tokenizers::Encoding;
use tokenizers::{Tokenizer as HfTokenizer, TruncationParams};

pub use error::{Result, TokenizationError};

/// Tokenizer wrapper providing consistent interface
pub struct Tokenizer {
    inner: HfTokenizer,
}

impl Tokenizer {
    /// Load tokenizer from file (tokenizer.json)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading tokenizer from {:?}", path);
        let inner = HfTokenizer::from_file(path).map_err(|e| TokenizationError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self { inner })
    }

    /// Truncate every encoding to `max_length` tokens (special tokens included)
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(TokenizationError::ZeroMaxLength);
        }
        let params = TruncationParams {
            max_length,
            ..Default::default()
        };
        self.inner
            .with_truncation(Some(params))
            .map_err(|e| TokenizationError::Truncation {
                max_length,
                reason: e.to_string(),
            })?;
        Ok(self)
    }

    /// Encode text to token IDs
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Encoding> {
        self.inner
            .encode(text, add_special_tokens)
            .map_err(|e| TokenizationError::Encode(e.to_string()))
    }

    /// Encode a text pair (e.g. question/context, premise/hypothesis)
    ///
    /// Offsets of the second sequence are relative to `second`, and
    /// `Encoding::get_sequence_ids` tells the two segments apart.
    pub fn encode_pair(&self, first: &str, second: &str, add_special_tokens: bool) -> Result<Encoding> {
        self.inner
            .encode((first, second), add_special_tokens)
            .map_err(|e| TokenizationError::Encode(e.to_string()))
    }

    /// Decode token IDs to text
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| TokenizationError::Decode(e.to_string()))
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.inner.token_to_id("</s>")
            .or_else(|| self.inner.token_to_id("<eos>"))
            .or_else(|| self.inner.token_to_id("[SEP]"))
    }

    pub fn pad_token_id(&self) -> Option<u32> {
        self.inner.token_to_id("<pad>")
            .or_else(|| self.inner.token_to_id("[PAD]"))
    }

    /// The mask token this vocabulary uses, BERT style first
    pub fn mask_token(&self) -> Option<&'static str> {
        ["[MASK]", "<mask>"]
            .into_iter()
            .find(|candidate| self.inner.token_to_id(candidate).is_some())
    }
}
