//! Image classification

use crate::adapters::ImageInput;
use crate::base::{TaskOptions, TaskPipeline, VisionModel};
use crate::error::{PipelineError, Result};
use crate::ops::{softmax, top_k};
use crate::tasks::text_classification::LabelScore;
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageClassificationOptions {
    pub top_k: usize,
}

impl Default for ImageClassificationOptions {
    fn default() -> Self {
        Self { top_k: 1 }
    }
}

impl TaskOptions for ImageClassificationOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PipelineError::config("top_k must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ImageClassificationPipeline {
    model: VisionModel,
}

impl ImageClassificationPipeline {
    pub fn new(model: VisionModel) -> Self {
        Self { model }
    }
}

impl TaskPipeline for ImageClassificationPipeline {
    type Input = ImageInput;
    type Output = Vec<LabelScore>;
    type Options = ImageClassificationOptions;

    fn task(&self) -> Task {
        Task::ImageClassification
    }

    fn run(&self, image: &ImageInput, options: &Self::Options) -> Result<Self::Output> {
        let pixels = self.model.processor.preprocess(image)?;
        let outputs = self.model.forward(&pixels)?;
        let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
        let probs = softmax(&logits.row(0).to_vec());

        Ok(top_k(&probs, options.top_k)
            .into_iter()
            .map(|(index, score)| LabelScore {
                label: self.model.config.label(index),
                score,
            })
            .collect())
    }
}
