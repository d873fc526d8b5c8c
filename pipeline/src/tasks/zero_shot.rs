//! NLI-based zero-shot text classification

use crate::base::{ensure_template, ensure_text, fill_template, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{softmax, sort_by_score_desc};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This example is {}.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZeroShotOptions {
    pub candidate_labels: Vec<String>,
    pub hypothesis_template: String,
    /// Score labels independently instead of as one distribution
    pub multi_label: bool,
}

impl Default for ZeroShotOptions {
    fn default() -> Self {
        Self {
            candidate_labels: Vec::new(),
            hypothesis_template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            multi_label: false,
        }
    }
}

impl ZeroShotOptions {
    pub fn with_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            candidate_labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn multi_label(mut self, multi_label: bool) -> Self {
        self.multi_label = multi_label;
        self
    }
}

impl TaskOptions for ZeroShotOptions {
    fn validate(&self) -> Result<()> {
        if self.candidate_labels.is_empty() {
            return Err(PipelineError::input("candidate_labels must not be empty"));
        }
        ensure_template(&self.hypothesis_template)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroShotResult {
    pub sequence: String,
    /// Sorted by descending score
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

#[derive(Clone)]
pub struct ZeroShotClassificationPipeline {
    model: TextModel,
    entailment: usize,
    contradiction: usize,
}

impl ZeroShotClassificationPipeline {
    /// Fails when the model's label map has no entailment/contradiction entries
    pub fn new(model: TextModel) -> Result<Self> {
        let entailment = model.config.label_index_with_prefix("entail").ok_or_else(|| {
            PipelineError::config("model config has no entailment label")
        })?;
        let contradiction = model.config.label_index_with_prefix("contra").ok_or_else(|| {
            PipelineError::config("model config has no contradiction label")
        })?;
        log::debug!(
            "NLI label indexes: entailment={}, contradiction={}",
            entailment,
            contradiction
        );
        Ok(Self {
            model,
            entailment,
            contradiction,
        })
    }
}

impl TaskPipeline for ZeroShotClassificationPipeline {
    type Input = str;
    type Output = ZeroShotResult;
    type Options = ZeroShotOptions;

    fn task(&self) -> Task {
        Task::ZeroShotClassification
    }

    fn check_input(&self, text: &str, _options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        // (entailment, contradiction) logits per label
        let mut pairs = Vec::with_capacity(options.candidate_labels.len());
        for label in &options.candidate_labels {
            let hypothesis = fill_template(&options.hypothesis_template, label);
            let encoding = self.model.tokenizer.encode_pair(text, &hypothesis)?;
            let outputs = self.model.forward(&encoding)?;
            let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
            let row = logits.row(0);
            let needed = self.entailment.max(self.contradiction);
            if row.len() <= needed {
                return Err(PipelineError::inference(format!(
                    "NLI logits have {} classes, need index {}",
                    row.len(),
                    needed
                )));
            }
            pairs.push((row[self.entailment], row[self.contradiction]));
        }

        let scores: Vec<f32> = if options.multi_label {
            pairs
                .iter()
                .map(|&(entail, contra)| softmax(&[contra, entail])[1])
                .collect()
        } else {
            softmax(&pairs.iter().map(|&(entail, _)| entail).collect::<Vec<_>>())
        };

        let mut ranked: Vec<(String, f32)> = options
            .candidate_labels
            .iter()
            .cloned()
            .zip(scores)
            .collect();
        sort_by_score_desc(&mut ranked, |(_, score)| *score);

        let (labels, scores) = ranked.into_iter().unzip();
        Ok(ZeroShotResult {
            sequence: text.to_string(),
            labels,
            scores,
        })
    }
}
