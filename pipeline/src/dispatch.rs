//! The closed set of loaded pipelines and the untyped JSON entry point

use crate::adapters::ImageInput;
use crate::base::{TaskOptions, TaskPipeline};
use crate::error::{PipelineError, Result};
use crate::factory::LoadedModel;
use crate::tasks::{
    EmbeddingPipeline, FeatureExtractionPipeline, FillMaskPipeline, ImageClassificationPipeline,
    ImageFeatureExtractionPipeline, QuestionAnsweringInput, QuestionAnsweringPipeline, RerankInput,
    RerankingPipeline, TextClassificationPipeline, TokenClassificationPipeline,
    ZeroShotClassificationPipeline, ZeroShotImageClassificationPipeline,
};
use crate::types::Task;
use ndarray::ArrayViewD;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Borrow;

/// A loaded pipeline, one variant per task
#[derive(Clone)]
pub enum Pipeline {
    TokenClassification(TokenClassificationPipeline),
    TextClassification(TextClassificationPipeline),
    QuestionAnswering(QuestionAnsweringPipeline),
    ZeroShotClassification(ZeroShotClassificationPipeline),
    FillMask(FillMaskPipeline),
    FeatureExtraction(FeatureExtractionPipeline),
    Embedding(EmbeddingPipeline),
    Reranking(RerankingPipeline),
    ImageClassification(ImageClassificationPipeline),
    ZeroShotImageClassification(ZeroShotImageClassificationPipeline),
    ImageFeatureExtraction(ImageFeatureExtractionPipeline),
}

impl Pipeline {
    /// Wrap loaded adapters in the pipeline for `task`
    pub fn build(task: Task, loaded: LoadedModel) -> Result<Self> {
        let pipeline = match task {
            Task::TokenClassification => {
                Self::TokenClassification(TokenClassificationPipeline::new(loaded.text_model()?))
            }
            Task::TextClassification => {
                Self::TextClassification(TextClassificationPipeline::new(loaded.text_model()?))
            }
            Task::QuestionAnswering => {
                Self::QuestionAnswering(QuestionAnsweringPipeline::new(loaded.text_model()?))
            }
            Task::ZeroShotClassification => {
                Self::ZeroShotClassification(ZeroShotClassificationPipeline::new(loaded.text_model()?)?)
            }
            Task::FillMask => Self::FillMask(FillMaskPipeline::new(loaded.text_model()?)),
            Task::FeatureExtraction => {
                Self::FeatureExtraction(FeatureExtractionPipeline::new(loaded.text_model()?))
            }
            Task::Embedding => Self::Embedding(EmbeddingPipeline::new(loaded.text_model()?)),
            Task::Reranking => Self::Reranking(RerankingPipeline::new(loaded.text_model()?)),
            Task::ImageClassification => {
                Self::ImageClassification(ImageClassificationPipeline::new(loaded.vision_model()?))
            }
            Task::ZeroShotImageClassification => {
                let tokenizer = loaded.tokenizer()?;
                let processor = loaded.processor()?;
                Self::ZeroShotImageClassification(ZeroShotImageClassificationPipeline::new(
                    tokenizer,
                    processor,
                    loaded.runtime,
                    loaded.config,
                ))
            }
            Task::ImageFeatureExtraction => {
                Self::ImageFeatureExtraction(ImageFeatureExtractionPipeline::new(loaded.vision_model()?))
            }
        };
        Ok(pipeline)
    }

    pub fn task(&self) -> Task {
        match self {
            Self::TokenClassification(p) => p.task(),
            Self::TextClassification(p) => p.task(),
            Self::QuestionAnswering(p) => p.task(),
            Self::ZeroShotClassification(p) => p.task(),
            Self::FillMask(p) => p.task(),
            Self::FeatureExtraction(p) => p.task(),
            Self::Embedding(p) => p.task(),
            Self::Reranking(p) => p.task(),
            Self::ImageClassification(p) => p.task(),
            Self::ZeroShotImageClassification(p) => p.task(),
            Self::ImageFeatureExtraction(p) => p.task(),
        }
    }

    /// Run with a JSON input and option bag
    ///
    /// A JSON array is a batch and yields an array of results in input order;
    /// anything else is a single input. Option keys the task does not know are
    /// rejected. `null` options mean defaults.
    pub fn call_json(&self, input: Value, options: Value) -> Result<Value> {
        match self {
            Self::TokenClassification(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::TextClassification(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::QuestionAnswering(p) => call_json::<_, QuestionAnsweringInput, _>(p, input, options, to_json),
            Self::ZeroShotClassification(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::FillMask(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::FeatureExtraction(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::Embedding(p) => call_json::<_, String, _>(p, input, options, to_json),
            Self::Reranking(p) => call_json::<_, RerankInput, _>(p, input, options, to_json),
            Self::ImageClassification(p) => call_json::<_, ImageInput, _>(p, input, options, to_json),
            Self::ZeroShotImageClassification(p) => call_json::<_, ImageInput, _>(p, input, options, to_json),
            Self::ImageFeatureExtraction(p) => {
                call_json::<_, ImageInput, _>(p, input, options, |features| {
                    Ok(array_to_json(features.view()))
                })
            }
        }
    }
}

macro_rules! accessors {
    ($($variant:ident => $name:ident : $ty:ty),* $(,)?) => {
        impl Pipeline {
            $(
                pub fn $name(&self) -> Option<&$ty> {
                    match self {
                        Self::$variant(pipeline) => Some(pipeline),
                        _ => None,
                    }
                }
            )*
        }
    };
}

accessors! {
    TokenClassification => as_token_classification: TokenClassificationPipeline,
    TextClassification => as_text_classification: TextClassificationPipeline,
    QuestionAnswering => as_question_answering: QuestionAnsweringPipeline,
    ZeroShotClassification => as_zero_shot_classification: ZeroShotClassificationPipeline,
    FillMask => as_fill_mask: FillMaskPipeline,
    FeatureExtraction => as_feature_extraction: FeatureExtractionPipeline,
    Embedding => as_embedding: EmbeddingPipeline,
    Reranking => as_reranking: RerankingPipeline,
    ImageClassification => as_image_classification: ImageClassificationPipeline,
    ZeroShotImageClassification => as_zero_shot_image_classification: ZeroShotImageClassificationPipeline,
    ImageFeatureExtraction => as_image_feature_extraction: ImageFeatureExtractionPipeline,
}

fn parse_options<O: TaskOptions>(options: Value) -> Result<O> {
    if options.is_null() {
        return Ok(O::default());
    }
    serde_json::from_value(options)
        .map_err(|e| PipelineError::config(format!("Invalid options: {}", e)))
}

fn parse_input<I: DeserializeOwned>(input: Value) -> Result<I> {
    serde_json::from_value(input).map_err(|e| PipelineError::input(format!("Invalid input: {}", e)))
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Nested JSON arrays in row-major order
fn array_to_json(array: ArrayViewD<'_, f32>) -> Value {
    if array.ndim() == 0 {
        return array.iter().next().map(|&v| Value::from(v)).unwrap_or(Value::Null);
    }
    Value::Array(array.outer_iter().map(array_to_json).collect())
}

fn call_json<P, I, F>(pipeline: &P, input: Value, options: Value, encode: F) -> Result<Value>
where
    P: TaskPipeline,
    I: DeserializeOwned + Borrow<P::Input>,
    F: Fn(P::Output) -> Result<Value>,
{
    let options: P::Options = parse_options(options)?;
    match input {
        Value::Array(items) => {
            let inputs = items
                .into_iter()
                .map(parse_input::<I>)
                .collect::<Result<Vec<I>>>()?;
            let outputs = pipeline.call_batch(&inputs, &options)?;
            let encoded = outputs.into_iter().map(encode).collect::<Result<Vec<Value>>>()?;
            Ok(Value::Array(encoded))
        }
        single => {
            let input: I = parse_input(single)?;
            encode(pipeline.call_one(input.borrow(), &options)?)
        }
    }
}
