//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use std::sync::Arc;
use taskpipe_pipeline::base::TextModel;
use taskpipe_pipeline::testing::{f32_tensor, MockRuntime, MockTokenizer};
use taskpipe_pipeline::{ModelConfig, NamedTensors, Result, Tensor, TextEncoding, TextTokenizer};

pub const RUBY_TEXT: &str = "Ruby is a programming language created by Matz";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ruby_tokenizer() -> MockTokenizer {
    MockTokenizer::new(&[
        "Ruby", "is", "a", "programming", "language", "created", "by", "Mat", "##z", "Who", "?",
    ])
}

pub fn ner_config() -> ModelConfig {
    ModelConfig::from_json(
        r#"{
            "id2label": {
                "0": "O", "1": "B-MISC", "2": "I-MISC", "3": "B-PER", "4": "I-PER",
                "5": "B-ORG", "6": "I-ORG", "7": "B-LOC", "8": "I-LOC"
            }
        }"#,
    )
    .expect("valid config")
}

pub fn labels_config(labels: &[&str]) -> ModelConfig {
    let id2label: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (i.to_string(), serde_json::Value::from(*label)))
        .collect();
    ModelConfig::from_json(&serde_json::json!({ "id2label": id2label }).to_string())
        .expect("valid config")
}

/// `[1, seq, num_labels]` logits: each token gets `(label, logit)` from `pick`, zeros elsewhere
pub fn token_logits(ids: &[i64], num_labels: usize, pick: impl Fn(usize, i64) -> (usize, f32)) -> Tensor {
    let mut data = vec![0.0f32; ids.len() * num_labels];
    for (position, &id) in ids.iter().enumerate() {
        let (label, logit) = pick(position, id);
        data[position * num_labels + label] = logit;
    }
    f32_tensor(&[1, ids.len(), num_labels], data)
}

pub fn text_model(tokenizer: MockTokenizer, runtime: Arc<MockRuntime>, config: ModelConfig) -> TextModel {
    TextModel::new(Arc::new(tokenizer), runtime, config)
}

/// Rows of a rank-2 i64 input
pub fn i64_rows(inputs: &NamedTensors, name: &str) -> Vec<Vec<i64>> {
    let array = inputs[name].as_i64().expect("i64 input");
    array
        .outer_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

/// Mock tokenizer with a different mask token and a hook that reshapes every encoding
pub struct TweakedTokenizer {
    pub inner: MockTokenizer,
    pub mask: Option<String>,
    pub tweak: fn(&mut TextEncoding),
}

impl TweakedTokenizer {
    pub fn new(inner: MockTokenizer) -> Self {
        Self {
            inner,
            mask: None,
            tweak: |_| {},
        }
    }
}

impl TextTokenizer for TweakedTokenizer {
    fn encode(&self, text: &str) -> Result<TextEncoding> {
        let mut encoding = self.inner.encode(text)?;
        (self.tweak)(&mut encoding);
        Ok(encoding)
    }

    fn encode_pair(&self, first: &str, second: &str) -> Result<TextEncoding> {
        let mut encoding = self.inner.encode_pair(first, second)?;
        (self.tweak)(&mut encoding);
        Ok(encoding)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.inner.decode(ids, skip_special_tokens)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    fn mask_token(&self) -> Option<String> {
        self.mask.clone().or_else(|| self.inner.mask_token())
    }
}
