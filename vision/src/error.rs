use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Failed to decode image: {0}")]
    DecodeFailed(#[from] image::ImageError),

    #[error("Invalid preprocessor configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
