//! ONNX Runtime inference loader
//!
//! Provides a high-level wrapper around the ort crate with:
//! - Device-driven execution provider selection (CUDA behind a feature, CPU fallback)
//! - Named `ndarray` inputs in, owned `f32` outputs out

pub mod error;
pub mod providers;
pub mod session;

pub use error::{OnnxError, Result};
pub use providers::Device;
pub use session::{InputTensor, OnnxSession, OutputTensor, SessionOptions};

/// Re-export full `ort` crate for advanced usage
pub use ort;
