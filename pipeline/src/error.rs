//! Pipeline errors
//!
//! Represents all possible failure modes for pipeline operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Unknown task, invalid option value, unusable model configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Missing mask token, empty label list, empty text, malformed image
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// A model, tokenizer or processor file could not be resolved or loaded
    #[error("Failed to acquire {file} for {model}: {reason}")]
    ResourceAcquisition {
        model: String,
        file: String,
        reason: String,
    },

    /// The runtime failed or produced outputs the pipeline cannot use
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    pub fn resource(model: impl Into<String>, file: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceAcquisition {
            model: model.into(),
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
