//! Hidden-state features and sentence embeddings

use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{l2_normalize, mean_pool};
use crate::tensor::{batch_matrix, first_output_with_rank, float_output, NamedTensors};
use crate::types::Task;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

const HIDDEN_STATE_OUTPUTS: [&str; 2] = ["last_hidden_state", "token_embeddings"];
const SENTENCE_EMBEDDING_OUTPUT: &str = "sentence_embedding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// One vector per token
    None,
    /// Mean over attended tokens
    Mean,
    /// The first token's vector
    Cls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureExtractionOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl Default for FeatureExtractionOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::None,
            normalize: false,
        }
    }
}

impl TaskOptions for FeatureExtractionOptions {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::Mean,
            normalize: true,
        }
    }
}

impl TaskOptions for EmbeddingOptions {
    fn validate(&self) -> Result<()> {
        if self.pooling == Pooling::None {
            return Err(PipelineError::config("embedding requires mean or cls pooling"));
        }
        Ok(())
    }
}

/// `[tokens, hidden]` for one text
fn hidden_states(outputs: &NamedTensors) -> Result<Array2<f32>> {
    let hidden = float_output(outputs, &HIDDEN_STATE_OUTPUTS)
        .ok()
        .or_else(|| first_output_with_rank(outputs, 3))
        .ok_or_else(|| {
            PipelineError::inference(format!(
                "no hidden-state output among {:?}",
                outputs.keys().collect::<Vec<_>>()
            ))
        })?;
    batch_matrix(hidden)
}

/// Pool and optionally normalize one text's outputs into rows
fn extract(
    outputs: &NamedTensors,
    attention_mask: &[u32],
    pooling: Pooling,
    normalize: bool,
) -> Result<Vec<Vec<f32>>> {
    let mut rows = match pooling {
        Pooling::None => hidden_states(outputs)?
            .rows()
            .into_iter()
            .map(|row| row.to_vec())
            .collect(),
        Pooling::Mean if outputs.contains_key(SENTENCE_EMBEDDING_OUTPUT) => {
            let pooled = batch_matrix(float_output(outputs, &[SENTENCE_EMBEDDING_OUTPUT])?)?;
            vec![pooled.row(0).to_vec()]
        }
        Pooling::Mean => {
            let hidden = hidden_states(outputs)?;
            vec![mean_pool(hidden.view(), attention_mask)]
        }
        Pooling::Cls => {
            let hidden = hidden_states(outputs)?;
            if hidden.nrows() == 0 {
                return Err(PipelineError::inference("empty hidden state"));
            }
            vec![hidden.row(0).to_vec()]
        }
    };
    if normalize {
        rows.iter_mut().for_each(|row| l2_normalize(row));
    }
    Ok(rows)
}

/// Raw token features; pooled features are a single row
#[derive(Clone)]
pub struct FeatureExtractionPipeline {
    model: TextModel,
}

impl FeatureExtractionPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }
}

impl TaskPipeline for FeatureExtractionPipeline {
    type Input = str;
    type Output = Vec<Vec<f32>>;
    type Options = FeatureExtractionOptions;

    fn task(&self) -> Task {
        Task::FeatureExtraction
    }

    fn check_input(&self, text: &str, _options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        let encoding = self.model.tokenizer.encode(text)?;
        let outputs = self.model.forward(&encoding)?;
        extract(&outputs, &encoding.attention_mask, options.pooling, options.normalize)
    }
}

/// Mean-pooled, unit-norm sentence vectors
#[derive(Clone)]
pub struct EmbeddingPipeline {
    model: TextModel,
}

impl EmbeddingPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.call_one(text, &EmbeddingOptions::default())
    }
}

impl TaskPipeline for EmbeddingPipeline {
    type Input = str;
    type Output = Vec<f32>;
    type Options = EmbeddingOptions;

    fn task(&self) -> Task {
        Task::Embedding
    }

    fn check_input(&self, text: &str, _options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        let encoding = self.model.tokenizer.encode(text)?;
        let outputs = self.model.forward(&encoding)?;
        extract(&outputs, &encoding.attention_mask, options.pooling, options.normalize)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::inference("pooling produced no vector"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use ndarray::{ArrayD, IxDyn};

    fn hidden(name: &str) -> NamedTensors {
        let data = vec![1.0, 0.0, 3.0, 4.0, 0.0, 0.0];
        let mut outputs = NamedTensors::new();
        outputs.insert(
            name.to_string(),
            Tensor::F32(ArrayD::from_shape_vec(IxDyn(&[1, 3, 2]), data).unwrap()),
        );
        outputs
    }

    #[test]
    fn test_unpooled_rows() {
        let rows = extract(&hidden("last_hidden_state"), &[1, 1, 1], Pooling::None, false).unwrap();
        assert_eq!(rows, vec![vec![1.0, 0.0], vec![3.0, 4.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn test_mean_pool_normalized() {
        let rows = extract(&hidden("token_embeddings"), &[1, 1, 0], Pooling::Mean, true).unwrap();
        assert_eq!(rows.len(), 1);
        let norm: f32 = rows[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((rows[0][0] - 0.707_106_8).abs() < 1e-5);
    }

    #[test]
    fn test_falls_back_to_first_rank3_output() {
        let rows = extract(&hidden("hidden_states_42"), &[1, 1, 1], Pooling::Cls, false).unwrap();
        assert_eq!(rows, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn test_sentence_embedding_only_replaces_mean() {
        let mut outputs = hidden("last_hidden_state");
        outputs.insert(
            SENTENCE_EMBEDDING_OUTPUT.to_string(),
            Tensor::F32(ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![9.0, 8.0]).unwrap()),
        );

        let mean = extract(&outputs, &[1, 1, 1], Pooling::Mean, false).unwrap();
        assert_eq!(mean, vec![vec![9.0, 8.0]]);
        let cls = extract(&outputs, &[1, 1, 1], Pooling::Cls, false).unwrap();
        assert_eq!(cls, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn test_embedding_rejects_no_pooling() {
        let options = EmbeddingOptions {
            pooling: Pooling::None,
            normalize: true,
        };
        assert!(matches!(options.validate(), Err(PipelineError::Configuration(_))));
    }
}
