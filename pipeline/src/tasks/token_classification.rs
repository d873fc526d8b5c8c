//! Token classification (NER)
//!
//! Per-token softmax over the label set, then optional aggregation of BIO
//! tagged tokens into entity spans.

use crate::adapters::TextEncoding;
use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{argmax, softmax};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// One record per token
    None,
    /// BIO merge of tokens
    #[default]
    Simple,
    /// Word label from its first token
    First,
    /// Word label from its averaged probabilities
    Average,
    /// Word label from its highest-scoring token
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenClassificationOptions {
    pub aggregation_strategy: AggregationStrategy,
    pub ignore_labels: Vec<String>,
}

impl Default for TokenClassificationOptions {
    fn default() -> Self {
        Self {
            aggregation_strategy: AggregationStrategy::Simple,
            ignore_labels: vec!["O".to_string()],
        }
    }
}

impl TaskOptions for TokenClassificationOptions {}

/// A single classified token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPrediction {
    pub entity: String,
    pub score: f32,
    /// Token position in the encoding, special tokens included
    pub index: usize,
    pub word: String,
    pub start: usize,
    pub end: usize,
}

/// A merged entity span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub entity_group: String,
    pub score: f32,
    pub word: String,
    pub start: usize,
    pub end: usize,
}

/// Per-token records or merged entities, depending on the strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TokenClassificationOutput {
    Tokens(Vec<TokenPrediction>),
    Entities(Vec<Entity>),
}

impl TokenClassificationOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Tokens(tokens) => tokens.len(),
            Self::Entities(entities) => entities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tokens(&self) -> Option<&[TokenPrediction]> {
        match self {
            Self::Tokens(tokens) => Some(tokens),
            Self::Entities(_) => None,
        }
    }

    pub fn entities(&self) -> Option<&[Entity]> {
        match self {
            Self::Entities(entities) => Some(entities),
            Self::Tokens(_) => None,
        }
    }
}

/// A token or word with its label distribution
#[derive(Debug, Clone)]
struct Scored {
    index: usize,
    ids: Vec<u32>,
    token: String,
    start: usize,
    end: usize,
    probs: Vec<f32>,
    label: usize,
    score: f32,
}

#[derive(Clone)]
pub struct TokenClassificationPipeline {
    model: TextModel,
}

impl TokenClassificationPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }

    fn score_tokens(&self, encoding: &TextEncoding) -> Result<Vec<Scored>> {
        let outputs = self.model.forward(encoding)?;
        let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
        if logits.nrows() != encoding.len() {
            return Err(PipelineError::inference(format!(
                "logits cover {} tokens, encoding has {}",
                logits.nrows(),
                encoding.len()
            )));
        }

        let mut scored = Vec::new();
        for (index, row) in logits.rows().into_iter().enumerate() {
            let offsets = match encoding.offsets[index] {
                Some(offsets) if !encoding.is_special(index) => offsets,
                _ => continue,
            };
            let probs = softmax(&row.to_vec());
            let (label, score) = argmax(&probs)
                .ok_or_else(|| PipelineError::inference("empty label dimension"))?;
            scored.push(Scored {
                index,
                ids: vec![encoding.ids[index]],
                token: encoding.tokens[index].clone(),
                start: offsets.0,
                end: offsets.1,
                probs,
                label,
                score,
            });
        }
        Ok(scored)
    }

    /// Merge sub-word tokens into words, labelled per `strategy`
    fn words(
        &self,
        encoding: &TextEncoding,
        tokens: Vec<Scored>,
        strategy: AggregationStrategy,
    ) -> Vec<Scored> {
        let mut groups: Vec<Vec<Scored>> = Vec::new();
        let mut previous_word: Option<u32> = None;
        for token in tokens {
            let word = encoding.word_ids.get(token.index).copied().flatten();
            let continues = match (word, previous_word) {
                (Some(w), Some(prev)) => w == prev,
                (None, _) => token.token.starts_with("##"),
                _ => false,
            };
            previous_word = word;
            match groups.last_mut() {
                Some(group) if continues => group.push(token),
                _ => groups.push(vec![token]),
            }
        }

        groups
            .into_iter()
            .filter_map(|group| {
                let first = group.first()?.clone();
                let last = group.last()?;
                let probs = match strategy {
                    AggregationStrategy::Average => {
                        let mut sum = vec![0.0f32; first.probs.len()];
                        for token in &group {
                            for (acc, p) in sum.iter_mut().zip(&token.probs) {
                                *acc += p;
                            }
                        }
                        sum.iter().map(|p| p / group.len() as f32).collect()
                    }
                    AggregationStrategy::Max => group
                        .iter()
                        .fold(&first, |best, token| if token.score > best.score { token } else { best })
                        .probs
                        .clone(),
                    _ => first.probs.clone(),
                };
                let (label, score) = argmax(&probs)?;
                Some(Scored {
                    index: first.index,
                    ids: group.iter().flat_map(|token| token.ids.clone()).collect(),
                    token: first.token.clone(),
                    start: first.start,
                    end: last.end,
                    probs,
                    label,
                    score,
                })
            })
            .collect()
    }

    /// BIO merge into entity groups
    fn group(&self, pieces: &[Scored]) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        let mut current: Option<(String, Vec<&Scored>)> = None;

        for piece in pieces {
            let label = self.model.config.label(piece.label);
            let (begins, tag) = split_tag(&label);
            let continues = matches!(&current, Some((open, _)) if !begins && open == tag);
            if continues {
                if let Some((_, members)) = current.as_mut() {
                    members.push(piece);
                }
            } else {
                if let Some((tag, members)) = current.take() {
                    entities.push(self.entity(tag, &members)?);
                }
                current = Some((tag.to_string(), vec![piece]));
            }
        }
        if let Some((tag, members)) = current.take() {
            entities.push(self.entity(tag, &members)?);
        }
        Ok(entities)
    }

    fn entity(&self, tag: String, members: &[&Scored]) -> Result<Entity> {
        let ids: Vec<u32> = members.iter().flat_map(|m| m.ids.iter().copied()).collect();
        let score = members.iter().map(|m| m.score).sum::<f32>() / members.len() as f32;
        let start = members.first().map(|m| m.start).unwrap_or(0);
        let end = members.last().map(|m| m.end).unwrap_or(start);
        Ok(Entity {
            entity_group: tag,
            score,
            word: self.model.tokenizer.decode(&ids, true)?,
            start,
            end,
        })
    }
}

/// `B-PER` → (true, "PER"); `I-PER` and bare `PER` → (false, "PER")
fn split_tag(label: &str) -> (bool, &str) {
    if let Some(tag) = label.strip_prefix("B-") {
        (true, tag)
    } else if let Some(tag) = label.strip_prefix("I-") {
        (false, tag)
    } else {
        (false, label)
    }
}

impl TaskPipeline for TokenClassificationPipeline {
    type Input = str;
    type Output = TokenClassificationOutput;
    type Options = TokenClassificationOptions;

    fn task(&self) -> Task {
        Task::TokenClassification
    }

    fn check_input(&self, text: &str, _options: &Self::Options) -> Result<()> {
        ensure_text(text, "text")
    }

    fn run(&self, text: &str, options: &Self::Options) -> Result<Self::Output> {
        let encoding = self.model.tokenizer.encode(text)?;
        let tokens = self.score_tokens(&encoding)?;
        let ignored = |label: &str| options.ignore_labels.iter().any(|l| l == label);

        if options.aggregation_strategy == AggregationStrategy::None {
            let predictions = tokens
                .into_iter()
                .map(|token| TokenPrediction {
                    entity: self.model.config.label(token.label),
                    score: token.score,
                    index: token.index,
                    word: token.token,
                    start: token.start,
                    end: token.end,
                })
                .filter(|prediction| !ignored(&prediction.entity))
                .collect();
            return Ok(TokenClassificationOutput::Tokens(predictions));
        }

        let pieces = match options.aggregation_strategy {
            AggregationStrategy::Simple => tokens,
            strategy => self.words(&encoding, tokens, strategy),
        };
        let entities = self
            .group(&pieces)?
            .into_iter()
            .filter(|entity| !ignored(&entity.entity_group))
            .collect();
        Ok(TokenClassificationOutput::Entities(entities))
    }
}
