//! Task enum - the closed set of supported pipelines
//!
//! Maps a task string (canonical id or alias) to a variant, and each variant to
//! its default model and the resources it needs.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Task {
    /// Named-entity recognition
    #[serde(rename = "token-classification", alias = "ner")]
    TokenClassification,

    /// Sentiment and other sequence classification
    #[serde(rename = "text-classification", alias = "sentiment-analysis")]
    TextClassification,

    /// Extractive question answering
    #[serde(rename = "question-answering")]
    QuestionAnswering,

    /// NLI-based zero-shot classification
    #[serde(rename = "zero-shot-classification")]
    ZeroShotClassification,

    #[serde(rename = "fill-mask")]
    FillMask,

    /// Raw hidden states, optionally pooled
    #[serde(rename = "feature-extraction")]
    FeatureExtraction,

    /// Mean-pooled, normalized sentence vectors
    #[serde(rename = "embedding")]
    Embedding,

    /// Cross-encoder document scoring
    #[serde(rename = "reranking")]
    Reranking,

    #[serde(rename = "image-classification")]
    ImageClassification,

    /// CLIP-style image/label matching
    #[serde(rename = "zero-shot-image-classification")]
    ZeroShotImageClassification,

    #[serde(rename = "image-feature-extraction")]
    ImageFeatureExtraction,
}

impl Task {
    pub const ALL: [Task; 11] = [
        Task::TokenClassification,
        Task::TextClassification,
        Task::QuestionAnswering,
        Task::ZeroShotClassification,
        Task::FillMask,
        Task::FeatureExtraction,
        Task::Embedding,
        Task::Reranking,
        Task::ImageClassification,
        Task::ZeroShotImageClassification,
        Task::ImageFeatureExtraction,
    ];

    /// Canonical task id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenClassification => "token-classification",
            Self::TextClassification => "text-classification",
            Self::QuestionAnswering => "question-answering",
            Self::ZeroShotClassification => "zero-shot-classification",
            Self::FillMask => "fill-mask",
            Self::FeatureExtraction => "feature-extraction",
            Self::Embedding => "embedding",
            Self::Reranking => "reranking",
            Self::ImageClassification => "image-classification",
            Self::ZeroShotImageClassification => "zero-shot-image-classification",
            Self::ImageFeatureExtraction => "image-feature-extraction",
        }
    }

    /// Parse a canonical id or one of the accepted aliases
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "ner" => Some(Self::TokenClassification),
            "sentiment-analysis" => Some(Self::TextClassification),
            other => Self::ALL.into_iter().find(|task| task.as_str() == other),
        }
    }

    /// Model used when the caller does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::TokenClassification => "Xenova/bert-base-NER",
            Self::TextClassification => "Xenova/distilbert-base-uncased-finetuned-sst-2-english",
            Self::QuestionAnswering => "Xenova/distilbert-base-cased-distilled-squad",
            Self::ZeroShotClassification => "Xenova/distilbert-base-uncased-mnli",
            Self::FillMask => "Xenova/bert-base-uncased",
            Self::FeatureExtraction | Self::Embedding => "Xenova/all-MiniLM-L6-v2",
            Self::Reranking => "mixedbread-ai/mxbai-rerank-base-v1",
            Self::ImageClassification => "Xenova/vit-base-patch16-224",
            Self::ZeroShotImageClassification => "Xenova/clip-vit-base-patch32",
            Self::ImageFeatureExtraction => "Xenova/vit-base-patch16-224-in21k",
        }
    }

    /// Whether the pipeline consumes text through a tokenizer
    pub fn needs_tokenizer(&self) -> bool {
        !matches!(self, Self::ImageClassification | Self::ImageFeatureExtraction)
    }

    /// Whether the pipeline consumes images through a preprocessor
    pub fn needs_image_processor(&self) -> bool {
        matches!(
            self,
            Self::ImageClassification
                | Self::ZeroShotImageClassification
                | Self::ImageFeatureExtraction
        )
    }
}

impl FromStr for Task {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| PipelineError::config(format!("Unknown task: {}", s)))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
