//! Backends that turn acquired files into loaded adapters

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;
