//! Image feature extraction

use crate::adapters::ImageInput;
use crate::base::{TaskOptions, TaskPipeline, VisionModel};
use crate::error::{PipelineError, Result};
use crate::tensor::float_output;
use crate::types::Task;
use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};

const FEATURE_OUTPUTS: [&str; 3] = ["last_hidden_state", "image_embeds", "pooler_output"];
const POOLED_OUTPUTS: [&str; 2] = ["pooler_output", "image_embeds"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageFeatureExtractionOptions {
    /// Return one pooled vector instead of the full feature tensor
    pub pool: bool,
}

impl TaskOptions for ImageFeatureExtractionOptions {}

#[derive(Clone)]
pub struct ImageFeatureExtractionPipeline {
    model: VisionModel,
}

impl ImageFeatureExtractionPipeline {
    pub fn new(model: VisionModel) -> Self {
        Self { model }
    }
}

fn drop_batch(array: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    if array.shape().first() != Some(&1) {
        return Err(PipelineError::inference(format!(
            "Expected a batch of one, got shape {:?}",
            array.shape()
        )));
    }
    Ok(array.index_axis(Axis(0), 0).to_owned())
}

impl TaskPipeline for ImageFeatureExtractionPipeline {
    type Input = ImageInput;
    /// Feature tensor without the batch dimension
    type Output = ArrayD<f32>;
    type Options = ImageFeatureExtractionOptions;

    fn task(&self) -> Task {
        Task::ImageFeatureExtraction
    }

    fn run(&self, image: &ImageInput, options: &Self::Options) -> Result<Self::Output> {
        let pixels = self.model.processor.preprocess(image)?;
        let outputs = self.model.forward(&pixels)?;

        if options.pool {
            if let Ok(pooled) = float_output(&outputs, &POOLED_OUTPUTS) {
                return drop_batch(pooled);
            }
            let hidden = drop_batch(float_output(&outputs, &["last_hidden_state"])?)?;
            if hidden.ndim() < 2 || hidden.shape()[0] == 0 {
                return Err(PipelineError::inference("no CLS row to pool"));
            }
            return Ok(hidden.index_axis(Axis(0), 0).to_owned());
        }

        let features = float_output(&outputs, &FEATURE_OUTPUTS)
            .ok()
            .or_else(|| outputs.values().find_map(|t| t.as_f32()))
            .ok_or_else(|| PipelineError::inference("model produced no float output"))?;
        drop_batch(features)
    }
}
