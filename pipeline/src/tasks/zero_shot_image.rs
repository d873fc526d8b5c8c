//! CLIP-style zero-shot image classification
//!
//! The image and every label hypothesis go through one dual-encoder run. The
//! model's `logits_per_image` are used when exported; otherwise cosine
//! similarities of the embeddings are scaled by the model temperature.

use crate::adapters::{ImageInput, ImageProcessor, ModelRuntime, TextTokenizer};
use crate::base::{ensure_template, fill_template, TaskOptions, TaskPipeline};
use crate::error::{PipelineError, Result};
use crate::model_config::ModelConfig;
use crate::ops::{cosine_similarity, softmax, sort_by_score_desc};
use crate::tasks::text_classification::LabelScore;
use crate::tensor::{as_matrix, batch_matrix, float_output, NamedTensors, Tensor};
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_IMAGE_HYPOTHESIS_TEMPLATE: &str = "This is a photo of {}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZeroShotImageOptions {
    pub candidate_labels: Vec<String>,
    pub hypothesis_template: String,
}

impl Default for ZeroShotImageOptions {
    fn default() -> Self {
        Self {
            candidate_labels: Vec::new(),
            hypothesis_template: DEFAULT_IMAGE_HYPOTHESIS_TEMPLATE.to_string(),
        }
    }
}

impl ZeroShotImageOptions {
    pub fn with_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            candidate_labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }
}

impl TaskOptions for ZeroShotImageOptions {
    fn validate(&self) -> Result<()> {
        if self.candidate_labels.is_empty() {
            return Err(PipelineError::input("candidate_labels must not be empty"));
        }
        ensure_template(&self.hypothesis_template)
    }
}

#[derive(Clone)]
pub struct ZeroShotImageClassificationPipeline {
    tokenizer: Arc<dyn TextTokenizer>,
    processor: Arc<dyn ImageProcessor>,
    runtime: Arc<dyn ModelRuntime>,
    config: Arc<ModelConfig>,
}

impl ZeroShotImageClassificationPipeline {
    pub fn new(
        tokenizer: Arc<dyn TextTokenizer>,
        processor: Arc<dyn ImageProcessor>,
        runtime: Arc<dyn ModelRuntime>,
        config: ModelConfig,
    ) -> Self {
        Self {
            tokenizer,
            processor,
            runtime,
            config: Arc::new(config),
        }
    }

    /// Right-padded `input_ids` and `attention_mask` for every hypothesis
    fn text_inputs(&self, hypotheses: &[String]) -> Result<NamedTensors> {
        let encodings = hypotheses
            .iter()
            .map(|h| {
                let encoding = self.tokenizer.encode(h)?;
                encoding.check_alignment()?;
                Ok(encoding)
            })
            .collect::<Result<Vec<_>>>()?;
        let width = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        let pad = i64::from(self.tokenizer.pad_token_id());

        let mut ids = Vec::with_capacity(encodings.len());
        let mut mask = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            let mut row: Vec<i64> = encoding.ids.iter().map(|&id| i64::from(id)).collect();
            let mut row_mask: Vec<i64> = encoding.attention_mask.iter().map(|&m| i64::from(m)).collect();
            row.resize(width, pad);
            row_mask.resize(width, 0);
            ids.push(row);
            mask.push(row_mask);
        }

        let accepted = self.runtime.input_names();
        let mut inputs = NamedTensors::new();
        inputs.insert("input_ids".to_string(), Tensor::i64_matrix(&ids)?);
        if accepted.iter().any(|name| name == "attention_mask") {
            inputs.insert("attention_mask".to_string(), Tensor::i64_matrix(&mask)?);
        }
        Ok(inputs)
    }

    /// One logit per label
    fn label_logits(&self, outputs: &NamedTensors, labels: usize) -> Result<Vec<f32>> {
        if let Ok(logits) = float_output(outputs, &["logits_per_image"]) {
            let row = batch_matrix(logits)?.row(0).to_vec();
            if row.len() != labels {
                return Err(PipelineError::inference(format!(
                    "logits_per_image has {} entries for {} labels",
                    row.len(),
                    labels
                )));
            }
            return Ok(row);
        }

        let image = batch_matrix(float_output(outputs, &["image_embeds"])?)?;
        let image = image.row(0).to_vec();
        let text = as_matrix(float_output(outputs, &["text_embeds"])?)?;
        if text.nrows() != labels {
            return Err(PipelineError::inference(format!(
                "text_embeds has {} rows for {} labels",
                text.nrows(),
                labels
            )));
        }
        let scale = self.config.similarity_scale();
        Ok(text
            .rows()
            .into_iter()
            .map(|row| scale * cosine_similarity(&image, &row.to_vec()))
            .collect())
    }
}

impl TaskPipeline for ZeroShotImageClassificationPipeline {
    type Input = ImageInput;
    type Output = Vec<LabelScore>;
    type Options = ZeroShotImageOptions;

    fn task(&self) -> Task {
        Task::ZeroShotImageClassification
    }

    fn run(&self, image: &ImageInput, options: &Self::Options) -> Result<Self::Output> {
        let pixels = self.processor.preprocess(image)?;
        let hypotheses: Vec<String> = options
            .candidate_labels
            .iter()
            .map(|label| fill_template(&options.hypothesis_template, label))
            .collect();

        let mut inputs = self.text_inputs(&hypotheses)?;
        inputs.insert("pixel_values".to_string(), Tensor::F32(pixels.tensor));
        log::debug!("Scoring image against {} labels", hypotheses.len());
        let outputs = self.runtime.run(inputs)?;

        let probs = softmax(&self.label_logits(&outputs, hypotheses.len())?);
        let mut results: Vec<LabelScore> = options
            .candidate_labels
            .iter()
            .zip(probs)
            .map(|(label, score)| LabelScore {
                label: label.clone(),
                score,
            })
            .collect();
        sort_by_score_desc(&mut results, |result| result.score);
        Ok(results)
    }
}
