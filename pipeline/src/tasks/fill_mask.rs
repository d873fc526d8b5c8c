//! Masked-token completion

use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{softmax, top_k};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MASK_TOKEN: &str = "[MASK]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FillMaskOptions {
    pub top_k: usize,
    /// Overrides the pipeline's mask token
    pub mask_token: Option<String>,
}

impl Default for FillMaskOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            mask_token: None,
        }
    }
}

impl TaskOptions for FillMaskOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PipelineError::config("top_k must be at least 1"));
        }
        if matches!(&self.mask_token, Some(token) if token.is_empty()) {
            return Err(PipelineError::config("mask_token must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskPrediction {
    pub score: f32,
    pub token: u32,
    pub token_str: String,
    /// Input with the first mask replaced, lowercased
    pub sequence: String,
}

#[derive(Clone)]
pub struct FillMaskPipeline {
    model: TextModel,
    mask_token: String,
}

impl FillMaskPipeline {
    /// Uses the tokenizer's mask token, `[MASK]` when it reports none
    pub fn new(model: TextModel) -> Self {
        let mask_token = model
            .tokenizer
            .mask_token()
            .unwrap_or_else(|| DEFAULT_MASK_TOKEN.to_string());
        Self { model, mask_token }
    }

    pub fn with_mask_token(mut self, mask_token: impl Into<String>) -> Self {
        self.mask_token = mask_token.into();
        self
    }

    pub fn mask_token(&self) -> &str {
        &self.mask_token
    }

    fn effective_mask<'a>(&'a self, options: &'a FillMaskOptions) -> &'a str {
        options.mask_token.as_deref().unwrap_or(&self.mask_token)
    }
}

fn mask_not_found(mask: &str) -> PipelineError {
    PipelineError::input(format!("Mask token ({}) not found in text.", mask))
}

impl TaskPipeline for FillMaskPipeline {
    type Input = str;
    type Output = Vec<MaskPrediction>;
    type Options = FillMaskOptions;

    fn task(&self) -> Task {
        Task::FillMask
    }

    fn check_input(&self, text: &str, options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")?;
        let mask = self.effective_mask(options);
        if !text.contains(mask) {
            return Err(mask_not_found(mask));
        }
        Ok(())
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        let mask = self.effective_mask(options);
        let mask_id = self
            .model
            .tokenizer
            .token_to_id(mask)
            .ok_or_else(|| PipelineError::config(format!("tokenizer has no id for {}", mask)))?;

        let encoding = self.model.tokenizer.encode(text)?;
        let position = encoding
            .ids
            .iter()
            .position(|&id| id == mask_id)
            .ok_or_else(|| mask_not_found(mask))?;

        let outputs = self.model.forward(&encoding)?;
        let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
        if position >= logits.nrows() {
            return Err(PipelineError::inference("mask position outside logits"));
        }
        let probs = softmax(&logits.row(position).to_vec());

        top_k(&probs, options.top_k)
            .into_iter()
            .map(|(id, score)| {
                let token = id as u32;
                let token_str = self.model.tokenizer.decode(&[token], true)?;
                let sequence = text.replacen(mask, &token_str, 1).to_lowercase();
                Ok(MaskPrediction {
                    score,
                    token,
                    token_str,
                    sequence,
                })
            })
            .collect()
    }
}
