use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TokenizationError>;

#[derive(Error, Debug)]
pub enum TokenizationError {
    #[error("Failed to load tokenizer from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("max_length must be greater than 0")]
    ZeroMaxLength,

    #[error("Failed to configure truncation to {max_length} tokens: {reason}")]
    Truncation { max_length: usize, reason: String },

    #[error("Failed to encode text: {0}")]
    Encode(String),

    #[error("Failed to decode token ids: {0}")]
    Decode(String),
}
