//! Task pipelines

pub mod feature_extraction;
pub mod fill_mask;
pub mod image_classification;
pub mod image_feature_extraction;
pub mod question_answering;
pub mod reranking;
pub mod text_classification;
pub mod token_classification;
pub mod zero_shot;
pub mod zero_shot_image;

pub use feature_extraction::{
    EmbeddingOptions, EmbeddingPipeline, FeatureExtractionOptions, FeatureExtractionPipeline,
    Pooling,
};
pub use fill_mask::{FillMaskOptions, FillMaskPipeline, MaskPrediction};
pub use image_classification::{ImageClassificationOptions, ImageClassificationPipeline};
pub use image_feature_extraction::{ImageFeatureExtractionOptions, ImageFeatureExtractionPipeline};
pub use question_answering::{
    Answer, QuestionAnsweringInput, QuestionAnsweringOptions, QuestionAnsweringPipeline,
};
pub use reranking::{RerankInput, RerankOptions, RerankResult, RerankingPipeline};
pub use text_classification::{
    LabelScore, ScoreFunction, TextClassificationOptions, TextClassificationPipeline,
};
pub use token_classification::{
    AggregationStrategy, Entity, TokenClassificationOptions, TokenClassificationOutput,
    TokenClassificationPipeline, TokenPrediction,
};
pub use zero_shot::{ZeroShotClassificationPipeline, ZeroShotOptions, ZeroShotResult};
pub use zero_shot_image::{ZeroShotImageClassificationPipeline, ZeroShotImageOptions};
