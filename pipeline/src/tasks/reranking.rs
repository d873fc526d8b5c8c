//! Cross-encoder reranking

use crate::base::{ensure_text, TaskOptions, TaskPipeline, TextModel};
use crate::error::{PipelineError, Result};
use crate::ops::{sigmoid, softmax, sort_by_score_desc};
use crate::tensor::{batch_matrix, float_output};
use crate::types::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankInput {
    pub query: String,
    pub documents: Vec<String>,
}

impl RerankInput {
    pub fn new<S: AsRef<str>>(query: impl Into<String>, documents: &[S]) -> Self {
        Self {
            query: query.into(),
            documents: documents.iter().map(|d| d.as_ref().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankResult {
    /// Index into the input documents
    pub doc_id: usize,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RerankOptions {
    /// Keep only the best `top_k`; all documents when unset
    pub top_k: Option<usize>,
    pub return_documents: bool,
}

impl TaskOptions for RerankOptions {
    fn validate(&self) -> Result<()> {
        if self.top_k == Some(0) {
            return Err(PipelineError::config("top_k must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RerankingPipeline {
    model: TextModel,
}

impl RerankingPipeline {
    pub fn new(model: TextModel) -> Self {
        Self { model }
    }

    fn relevance(&self, query: &str, document: &str) -> Result<f32> {
        let encoding = self.model.tokenizer.encode_pair(query, document)?;
        let outputs = self.model.forward(&encoding)?;
        let logits = batch_matrix(float_output(&outputs, &["logits"])?)?;
        let row = logits.row(0).to_vec();
        match row.as_slice() {
            [logit] => Ok(sigmoid(*logit)),
            [_, _] => Ok(softmax(&row)[1]),
            other => Err(PipelineError::inference(format!(
                "reranker must emit 1 or 2 logits, got {}",
                other.len()
            ))),
        }
    }
}

impl TaskPipeline for RerankingPipeline {
    type Input = RerankInput;
    type Output = Vec<RerankResult>;
    type Options = RerankOptions;

    fn task(&self) -> Task {
        Task::Reranking
    }

    fn check_input(&self, input: &RerankInput, _options: &Self::Options) -> Result<()> {
        ensure_text(&input.query, "query")
    }

    fn run(&self, input: &RerankInput, options: &Self::Options) -> Result<Self::Output> {
        let mut results = Vec::with_capacity(input.documents.len());
        for (doc_id, document) in input.documents.iter().enumerate() {
            results.push(RerankResult {
                doc_id,
                score: self.relevance(&input.query, document)?,
                text: options.return_documents.then(|| document.clone()),
            });
        }

        sort_by_score_desc(&mut results, |result| result.score);
        if let Some(k) = options.top_k {
            results.truncate(k);
        }
        Ok(results)
    }
}
