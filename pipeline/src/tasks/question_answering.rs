//! Extractive question answering
//!
//! Start and end logits are softmaxed over context tokens only; the answer is
//! the span maximizing `p_start[i] * p_end[j]` with `i <= j` and a bounded
//! length, mapped back to the context through token offsets.

use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{softmax, sort_by_score_desc};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnsweringInput {
    pub question: String,
    pub context: String,
}

impl QuestionAnsweringInput {
    pub fn new(question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub score: f32,
    pub answer: String,
    /// Byte offsets into the context
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuestionAnsweringOptions {
    pub top_k: usize,
    /// Longest answer, in tokens
    pub max_answer_length: usize,
}

impl Default for QuestionAnsweringOptions {
    fn default() -> Self {
        Self {
            top_k: 1,
            max_answer_length: 15,
        }
    }
}

impl TaskOptions for QuestionAnsweringOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PipelineError::config("top_k must be at least 1"));
        }
        if self.max_answer_length == 0 {
            return Err(PipelineError::config("max_answer_length must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct QuestionAnsweringPipeline {
    model: TextModel,
}

impl QuestionAnsweringPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }

    /// Best answer for one question
    pub fn answer(&self, question: &str, context: &str) -> Result<Answer> {
        let input = QuestionAnsweringInput::new(question, context);
        self.call_one(&input, &QuestionAnsweringOptions::default())?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::inference("no answer span found"))
    }
}

impl TaskPipeline for QuestionAnsweringPipeline {
    type Input = QuestionAnsweringInput;
    type Output = Vec<Answer>;
    type Options = QuestionAnsweringOptions;

    fn task(&self) -> Task {
        Task::QuestionAnswering
    }

    fn check_input(&self, input: &QuestionAnsweringInput, _options: &Self::Options) -> Result<()> {
        ensure_text(&input.question, "question")?;
        ensure_text(&input.context, "context")
    }

    fn run(&self, input: &QuestionAnsweringInput, options: &Self::Options) -> Result<Self::Output> {
        let encoding = self
            .model
            .tokenizer
            .encode_pair(&input.question, &input.context)?;

        let valid: Vec<usize> = (0..encoding.len())
            .filter(|&i| {
                encoding.sequence_ids.get(i).copied().flatten() == Some(1)
                    && !encoding.is_special(i)
                    && encoding.offsets.get(i).copied().flatten().is_some()
            })
            .collect();
        if valid.is_empty() {
            return Err(PipelineError::input("context produced no tokens"));
        }

        let outputs = self.model.forward(&encoding)?;
        let start_logits = batch_matrix(float_output(&outputs, &["start_logits"])?)?;
        let end_logits = batch_matrix(float_output(&outputs, &["end_logits"])?)?;
        let start_row = start_logits.row(0);
        let end_row = end_logits.row(0);
        if start_row.len() != encoding.len() || end_row.len() != encoding.len() {
            return Err(PipelineError::inference("span logits do not match the encoding length"));
        }

        let start_probs = softmax(&valid.iter().map(|&i| start_row[i]).collect::<Vec<_>>());
        let end_probs = softmax(&valid.iter().map(|&i| end_row[i]).collect::<Vec<_>>());

        // (start token, end token, score)
        let mut candidates = Vec::new();
        for (a, &i) in valid.iter().enumerate() {
            for (b, &j) in valid.iter().enumerate().skip(a) {
                if j - i >= options.max_answer_length {
                    break;
                }
                candidates.push((i, j, start_probs[a] * end_probs[b]));
            }
        }
        sort_by_score_desc(&mut candidates, |&(_, _, score)| score);

        let mut chosen: Vec<(usize, usize, f32)> = Vec::new();
        for candidate in candidates {
            if chosen.len() == options.top_k {
                break;
            }
            let overlaps = chosen
                .iter()
                .any(|&(i, j, _)| candidate.0 <= j && i <= candidate.1);
            if !overlaps {
                chosen.push(candidate);
            }
        }

        chosen
            .into_iter()
            .map(|(i, j, score)| {
                let start = encoding.offsets[i].map(|(s, _)| s).unwrap_or(0);
                let end = encoding.offsets[j].map(|(_, e)| e).unwrap_or(start);
                let answer = input.context.get(start..end).ok_or_else(|| {
                    PipelineError::inference(format!("answer offsets {}..{} outside context", start, end))
                })?;
                Ok(Answer {
                    score,
                    answer: answer.to_string(),
                    start,
                    end,
                })
            })
            .collect()
    }
}
