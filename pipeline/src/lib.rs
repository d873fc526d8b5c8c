//! Taskpipe - task pipelines over pretrained transformer models
//!
//! Turns raw model outputs (token logits, image logits, hidden states) into
//! task results: entities, labels, answer spans, mask completions, embeddings
//! and reranked documents.
//!
//! **Composable**: tokenization, image preprocessing and inference live in
//! their own crates behind the adapter traits in [`adapters`]; this crate owns
//! the post-processing, the load/progress protocol and task dispatch.
//!
//! ```no_run
//! use taskpipe_pipeline::{pipeline, PipelineOptions, TaskPipeline};
//! use taskpipe_pipeline::tasks::TokenClassificationOptions;
//!
//! # fn main() -> taskpipe_pipeline::Result<()> {
//! let ner = pipeline("ner", PipelineOptions::new())?;
//! let ner = ner.as_token_classification().expect("ner pipeline");
//! let entities = ner.call_one(
//!     "Ruby is a programming language created by Matz",
//!     &TokenClassificationOptions::default(),
//! )?;
//! println!("{:?}", entities);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod backends;
pub mod base;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod model_config;
pub mod ops;
pub mod progress;
pub mod resources;
pub mod tasks;
pub mod tensor;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapters::{ImageInput, ImageProcessor, ModelRuntime, PixelValues, TextEncoding, TextTokenizer};
pub use base::{TaskOptions, TaskPipeline};
pub use config::{Device, PipelineOptions, Settings};
pub use dispatch::Pipeline;
pub use error::{PipelineError, Result};
pub use factory::{Backend, LoadedModel, PipelineFactory};
pub use model_config::ModelConfig;
pub use progress::{NoProgress, ProgressEvent, ProgressLog, ProgressSink};
pub use resources::{acquire_resources, AcquiredResources, LocalModelStore, PipelineSpec, ResourceStore};
pub use tensor::{NamedTensors, Tensor};
pub use types::Task;

#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;

/// Build a pipeline from the local model cache with the ONNX backend
///
/// The cache directory comes from `TASKPIPE_CACHE_DIR` or the platform cache
/// directory; files are expected at `<cache>/<model>/<file>`.
#[cfg(feature = "onnx")]
pub fn pipeline(task: &str, options: PipelineOptions) -> Result<Pipeline> {
    PipelineFactory::new(LocalModelStore::from_env(), OnnxBackend::default()).create(task, options)
}
