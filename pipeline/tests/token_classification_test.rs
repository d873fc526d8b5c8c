//! Token classification (NER) through mock adapters

mod common;

use common::*;
use std::sync::Arc;
use taskpipe_pipeline::tasks::{
    AggregationStrategy, TokenClassificationOptions, TokenClassificationOutput,
    TokenClassificationPipeline,
};
use taskpipe_pipeline::testing::{input_ids, outputs, MockRuntime};
use taskpipe_pipeline::base::TextModel;
use taskpipe_pipeline::{PipelineError, TaskPipeline};

const B_PER: usize = 3;
const I_PER: usize = 4;
const I_LOC: usize = 8;

/// "Mat" → B-PER, "##z" → `z_label`, everything else → O
fn pipeline_with(z_label: usize, z_logit: f32) -> (TokenClassificationPipeline, Arc<MockRuntime>) {
    let tokenizer = ruby_tokenizer();
    let mat = i64::from(tokenizer.id("Mat"));
    let z = i64::from(tokenizer.id("##z"));
    let runtime = Arc::new(MockRuntime::text(move |inputs| {
        let ids = input_ids(inputs);
        let logits = token_logits(&ids, 9, |_, id| {
            if id == mat {
                (B_PER, 6.0)
            } else if id == z {
                (z_label, z_logit)
            } else {
                (0, 8.0)
            }
        });
        Ok(outputs(vec![("logits", logits)]))
    }));
    let pipeline = TokenClassificationPipeline::new(text_model(tokenizer, runtime.clone(), ner_config()));
    (pipeline, runtime)
}

fn options(strategy: AggregationStrategy) -> TokenClassificationOptions {
    TokenClassificationOptions {
        aggregation_strategy: strategy,
        ..Default::default()
    }
}

#[test]
fn test_simple_aggregation_merges_subwords() {
    init_logging();
    let (pipeline, runtime) = pipeline_with(I_PER, 5.0);

    let result = pipeline
        .call_one(RUBY_TEXT, &TokenClassificationOptions::default())
        .expect("ner failed");

    let entities = result.entities().expect("aggregated output");
    assert_eq!(entities.len(), 1);
    let entity = &entities[0];
    assert_eq!(entity.entity_group, "PER");
    assert_eq!(entity.word, "Matz");
    assert_eq!((entity.start, entity.end), (42, 46));
    assert_eq!(&RUBY_TEXT[entity.start..entity.end], "Matz");
    assert_eq!(runtime.calls(), 1);
}

#[test]
fn test_entity_score_is_mean_of_members() {
    let (pipeline, _) = pipeline_with(I_PER, 5.0);

    let tokens = pipeline
        .call_one(RUBY_TEXT, &options(AggregationStrategy::None))
        .unwrap();
    let tokens = tokens.tokens().unwrap();
    let entities = pipeline
        .call_one(RUBY_TEXT, &TokenClassificationOptions::default())
        .unwrap();
    let entity = &entities.entities().unwrap()[0];

    let mean = (tokens[0].score + tokens[1].score) / 2.0;
    assert!((entity.score - mean).abs() < 1e-6);
}

#[test]
fn test_none_strategy_reports_tokens() {
    let (pipeline, _) = pipeline_with(I_PER, 5.0);

    let result = pipeline
        .call_one(RUBY_TEXT, &options(AggregationStrategy::None))
        .unwrap();

    let tokens = result.tokens().expect("token output");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].entity, "B-PER");
    assert_eq!(tokens[0].index, 8);
    assert_eq!(tokens[0].word, "Mat");
    assert_eq!((tokens[0].start, tokens[0].end), (42, 45));
    assert_eq!(tokens[1].entity, "I-PER");
    assert_eq!(tokens[1].index, 9);
    assert_eq!(tokens[1].word, "##z");
    assert!(tokens.iter().all(|t| t.score > 0.9 && t.score <= 1.0));
}

#[test]
fn test_ignore_labels_empty_keeps_outside_tokens() {
    let (pipeline, _) = pipeline_with(I_PER, 5.0);
    let options = TokenClassificationOptions {
        aggregation_strategy: AggregationStrategy::None,
        ignore_labels: Vec::new(),
    };

    let result = pipeline.call_one(RUBY_TEXT, &options).unwrap();
    // every non-special token
    assert_eq!(result.len(), 9);
}

#[test]
fn test_type_change_splits_entities() {
    let (pipeline, _) = pipeline_with(I_LOC, 9.0);

    let result = pipeline
        .call_one(RUBY_TEXT, &TokenClassificationOptions::default())
        .unwrap();
    let entities = result.entities().unwrap();

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].entity_group, "PER");
    assert_eq!(entities[0].word, "Mat");
    assert_eq!(entities[1].entity_group, "LOC");
    assert_eq!((entities[1].start, entities[1].end), (45, 46));
}

#[test]
fn test_word_strategies() {
    let (pipeline, _) = pipeline_with(I_LOC, 9.0);

    let first = pipeline.call_one(RUBY_TEXT, &options(AggregationStrategy::First)).unwrap();
    let first = first.entities().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].entity_group, "PER");
    assert_eq!(first[0].word, "Matz");
    assert_eq!((first[0].start, first[0].end), (42, 46));

    let max = pipeline.call_one(RUBY_TEXT, &options(AggregationStrategy::Max)).unwrap();
    let max = max.entities().unwrap();
    assert_eq!(max.len(), 1);
    assert_eq!(max[0].entity_group, "LOC");
    assert_eq!(max[0].word, "Matz");

    let average = pipeline.call_one(RUBY_TEXT, &options(AggregationStrategy::Average)).unwrap();
    let average = average.entities().unwrap();
    assert_eq!(average.len(), 1);
    assert_eq!(average[0].entity_group, "LOC");
    assert!(average[0].score < max[0].score);
}

#[test]
fn test_batch_preserves_order() {
    let (pipeline, runtime) = pipeline_with(I_PER, 5.0);

    let results = pipeline
        .call_batch(&["Ruby is a language", RUBY_TEXT], &TokenClassificationOptions::default())
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_empty());
    assert_eq!(results[1].len(), 1);
    assert_eq!(runtime.calls(), 2);
}

#[test]
fn test_empty_text_rejected_before_inference() {
    let (pipeline, runtime) = pipeline_with(I_PER, 5.0);

    let err = pipeline
        .call_batch(&[RUBY_TEXT, ""], &TokenClassificationOptions::default())
        .unwrap_err();

    assert!(matches!(err, PipelineError::InputValidation(_)));
    assert_eq!(runtime.calls(), 0);
}

#[test]
fn test_misaligned_encoding_is_an_inference_error() {
    let runtime = Arc::new(MockRuntime::text(|_| unreachable!()));
    let mut tokenizer = TweakedTokenizer::new(ruby_tokenizer());
    tokenizer.tweak = |encoding| {
        encoding.offsets.pop();
        encoding.special_tokens_mask.pop();
    };
    let model = TextModel::new(Arc::new(tokenizer), runtime.clone(), ner_config());
    let pipeline = TokenClassificationPipeline::new(model);

    let err = pipeline
        .call_one(RUBY_TEXT, &TokenClassificationOptions::default())
        .unwrap_err();

    match err {
        PipelineError::Inference(msg) => assert!(msg.contains("offsets"), "{}", msg),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(runtime.calls(), 0);
}

#[test]
fn test_output_serializes_by_strategy() {
    let (pipeline, _) = pipeline_with(I_PER, 5.0);

    let grouped = pipeline.call_one(RUBY_TEXT, &TokenClassificationOptions::default()).unwrap();
    let json = serde_json::to_value(&grouped).unwrap();
    assert_eq!(json[0]["entity_group"], "PER");
    assert_eq!(json[0]["start"], 42);

    let tokens = pipeline.call_one(RUBY_TEXT, &options(AggregationStrategy::None)).unwrap();
    assert!(matches!(tokens, TokenClassificationOutput::Tokens(_)));
    let json = serde_json::to_value(&tokens).unwrap();
    assert_eq!(json[0]["entity"], "B-PER");
    assert_eq!(json[0]["index"], 8);
}
