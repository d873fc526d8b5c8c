//! Sequence classification (sentiment and friends)

use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{sigmoid, softmax, top_k};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

/// A label with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// How logits become scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFunction {
    Softmax,
    Sigmoid,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextClassificationOptions {
    pub top_k: usize,
    /// Defaults to sigmoid for multi-label or single-logit models, softmax otherwise
    pub function_to_apply: Option<ScoreFunction>,
}

impl Default for TextClassificationOptions {
    fn default() -> Self {
        Self {
            top_k: 1,
            function_to_apply: None,
        }
    }
}

impl TaskOptions for TextClassificationOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PipelineError::config("top_k must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TextClassificationPipeline {
    model: TextModel,
}

impl TextClassificationPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }

    /// Best label for one text
    pub fn classify(&self, text: &str) -> Result<LabelScore> {
        self.call_one(text, &TextClassificationOptions::default())?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::inference("model produced no labels"))
    }

    fn score_function(&self, options: &TextClassificationOptions, num_logits: usize) -> ScoreFunction {
        options.function_to_apply.unwrap_or_else(|| {
            if self.model.config.is_multi_label() || num_logits == 1 {
                ScoreFunction::Sigmoid
            } else {
                ScoreFunction::Softmax
            }
        })
    }
}

impl TaskPipeline for TextClassificationPipeline {
    type Input = str;
    type Output = Vec<LabelScore>;
    type Options = TextClassificationOptions;

    fn task(&self) -> Task {
        Task::TextClassification
    }

    fn check_input(&self, text: &str, _options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        let encoding = self.model.tokenizer.encode(text)?;
        let outputs = self.model.forward(&encoding)?;
        let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
        let logits = logits.row(0).to_vec();

        let scores = match self.score_function(options, logits.len()) {
            ScoreFunction::Softmax => softmax(&logits),
            ScoreFunction::Sigmoid => logits.iter().map(|&x| sigmoid(x)).collect(),
            ScoreFunction::None => logits,
        };

        Ok(top_k(&scores, options.top_k)
            .into_iter()
            .map(|(index, score)| LabelScore {
                label: self.model.config.label(index),
                score,
            })
            .collect())
    }
}
