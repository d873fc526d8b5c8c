use thiserror::Error;

pub type Result<T> = std::result::Result<T, OnnxError>;

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("Failed to load model: {0}")]
    ModelLoadFailed(String),

    #[error("Failed to create session: {0}")]
    SessionCreationFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model has no output named {0}")]
    MissingOutput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
