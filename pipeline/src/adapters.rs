//! Adapter seams between task pipelines and the reference components
//!
//! Pipelines only see these traits: a tokenizer, an image processor and a
//! model runtime. The ONNX backend implements them over the tokenization,
//! vision and onnx-loader crates; tests implement them with mocks.

use crate::error::{PipelineError, Result};
use crate::tensor::{NamedTensors, Tensor};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A tokenized sequence (or sequence pair) with alignment metadata
///
/// Offsets are byte ranges into the source text and are `None` for special
/// tokens. `sequence_ids` is `Some(0)` for the first text, `Some(1)` for the
/// second text of a pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextEncoding {
    pub ids: Vec<u32>,
    pub tokens: Vec<String>,
    pub offsets: Vec<Option<(usize, usize)>>,
    pub special_tokens_mask: Vec<bool>,
    pub attention_mask: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub word_ids: Vec<Option<u32>>,
    pub sequence_ids: Vec<Option<usize>>,
}

impl TextEncoding {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_special(&self, index: usize) -> bool {
        self.special_tokens_mask.get(index).copied().unwrap_or(false)
    }

    /// Every per-token vector must carry one entry per id
    pub fn check_alignment(&self) -> Result<()> {
        let expected = self.ids.len();
        let lengths = [
            ("tokens", self.tokens.len()),
            ("offsets", self.offsets.len()),
            ("special_tokens_mask", self.special_tokens_mask.len()),
            ("attention_mask", self.attention_mask.len()),
            ("type_ids", self.type_ids.len()),
            ("word_ids", self.word_ids.len()),
            ("sequence_ids", self.sequence_ids.len()),
        ];
        match lengths.iter().find(|(_, len)| *len != expected) {
            Some((field, len)) => Err(PipelineError::inference(format!(
                "tokenizer returned {} {} for {} ids",
                len, field, expected
            ))),
            None => Ok(()),
        }
    }

    /// Graph inputs for this encoding, limited to the names the graph accepts
    pub fn model_inputs(&self, accepted: &[String]) -> NamedTensors {
        let mut inputs = NamedTensors::new();
        let mut insert = |name: &str, tensor: Tensor| {
            if accepted.iter().any(|n| n == name) {
                inputs.insert(name.to_string(), tensor);
            }
        };
        insert("input_ids", Tensor::i64_row(&self.ids));
        insert("attention_mask", Tensor::i64_row(&self.attention_mask));
        insert("token_type_ids", Tensor::i64_row(&self.type_ids));
        inputs
    }
}

/// Text tokenizer seam
pub trait TextTokenizer: Send + Sync {
    /// Encode one text with special tokens
    fn encode(&self, text: &str) -> Result<TextEncoding>;

    /// Encode a text pair with special tokens
    fn encode_pair(&self, first: &str, second: &str) -> Result<TextEncoding>;

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, id: u32) -> Option<String>;

    /// Mask token of the vocabulary (`[MASK]`, `<mask>`), if it has one
    fn mask_token(&self) -> Option<String> {
        None
    }

    /// Id used to right-pad batched sequences
    fn pad_token_id(&self) -> u32 {
        0
    }
}

/// An image to preprocess: a file path or encoded bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for ImageInput {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Model-ready pixels: `[1, channels, height, width]`
#[derive(Debug, Clone)]
pub struct PixelValues {
    pub tensor: ArrayD<f32>,
    /// `(height, width)` of the decoded image before resizing
    pub original_size: (u32, u32),
}

/// Image preprocessor seam
pub trait ImageProcessor: Send + Sync {
    fn preprocess(&self, image: &ImageInput) -> Result<PixelValues>;
}

/// Model runtime seam: named tensors in, named tensors out
pub trait ModelRuntime: Send + Sync {
    /// Input names the graph declares
    fn input_names(&self) -> Vec<String>;

    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors>;
}
