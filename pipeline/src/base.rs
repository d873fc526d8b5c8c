//! Base pipeline trait - the shared preprocess → infer → postprocess shape
//!
//! Every task pipeline exposes two entry points: `call_one` for a single input
//! and `call_batch` for a slice of inputs. Batches are validated up front and
//! processed in input order, one runtime call per element.

use crate::adapters::{ImageProcessor, ModelRuntime, PixelValues, TextEncoding, TextTokenizer};
use crate::error::{PipelineError, Result};
use crate::model_config::ModelConfig;
use crate::tensor::{NamedTensors, Tensor};
use crate::types::Task;
use serde::de::DeserializeOwned;
use std::borrow::Borrow;
use std::sync::Arc;

/// Typed per-call options of one task
pub trait TaskOptions: Default + DeserializeOwned {
    /// Reject option values the task cannot honor
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Base trait that all task pipelines implement
pub trait TaskPipeline: Send + Sync {
    type Input: ?Sized;
    type Output;
    type Options: TaskOptions;

    fn task(&self) -> Task;

    /// Input checks that must pass before the model runs
    fn check_input(&self, _input: &Self::Input, _options: &Self::Options) -> Result<()> {
        Ok(())
    }

    /// Run on one input; assumes `options` and `input` were checked
    fn run(&self, input: &Self::Input, options: &Self::Options) -> Result<Self::Output>;

    fn call_one(&self, input: &Self::Input, options: &Self::Options) -> Result<Self::Output> {
        options.validate()?;
        self.check_input(input, options)?;
        self.run(input, options)
    }

    fn call_batch<B: Borrow<Self::Input>>(
        &self,
        inputs: &[B],
        options: &Self::Options,
    ) -> Result<Vec<Self::Output>> {
        options.validate()?;
        for input in inputs {
            self.check_input(input.borrow(), options)?;
        }
        log::debug!("{}: running batch of {}", self.task(), inputs.len());
        inputs
            .iter()
            .map(|input| self.run(input.borrow(), options))
            .collect()
    }
}

/// Reject empty or whitespace-only text
pub fn ensure_text(text: &str, what: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(PipelineError::input(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// Substitute `value` into a `{}` template
pub fn fill_template(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

pub fn ensure_template(template: &str) -> Result<()> {
    if !template.contains("{}") {
        return Err(PipelineError::config(format!(
            "hypothesis_template must contain {{}}: {:?}",
            template
        )));
    }
    Ok(())
}

/// Tokenizer, runtime and config of a text model
#[derive(Clone)]
pub struct TextModel {
    pub tokenizer: Arc<dyn TextTokenizer>,
    pub runtime: Arc<dyn ModelRuntime>,
    pub config: Arc<ModelConfig>,
}

impl TextModel {
    pub fn new(
        tokenizer: Arc<dyn TextTokenizer>,
        runtime: Arc<dyn ModelRuntime>,
        config: ModelConfig,
    ) -> Self {
        Self {
            tokenizer,
            runtime,
            config: Arc::new(config),
        }
    }

    /// Run the model on one encoding
    pub fn forward(&self, encoding: &TextEncoding) -> Result<NamedTensors> {
        encoding.check_alignment()?;
        let inputs = encoding.model_inputs(&self.runtime.input_names());
        log::debug!("Running model on {} tokens", encoding.len());
        self.runtime.run(inputs)
    }
}

/// Image processor, runtime and config of a vision model
#[derive(Clone)]
pub struct VisionModel {
    pub processor: Arc<dyn ImageProcessor>,
    pub runtime: Arc<dyn ModelRuntime>,
    pub config: Arc<ModelConfig>,
}

impl VisionModel {
    pub fn new(
        processor: Arc<dyn ImageProcessor>,
        runtime: Arc<dyn ModelRuntime>,
        config: ModelConfig,
    ) -> Self {
        Self {
            processor,
            runtime,
            config: Arc::new(config),
        }
    }

    /// Run the model on preprocessed pixels
    pub fn forward(&self, pixels: &PixelValues) -> Result<NamedTensors> {
        let mut inputs = NamedTensors::new();
        inputs.insert("pixel_values".to_string(), Tensor::F32(pixels.tensor.clone()));
        log::debug!("Running model on pixels {:?}", pixels.tensor.shape());
        self.runtime.run(inputs)
    }
}
