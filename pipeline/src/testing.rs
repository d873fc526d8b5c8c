//! Mock adapters for driving pipelines without model files
//!
//! `MockTokenizer` is a tiny WordPiece tokenizer over an explicit vocabulary,
//! `MockRuntime` answers runs with a closure, `MockImageProcessor` returns
//! constant pixels. `MockBackend` hands all three to the factory.

use crate::adapters::{
    ImageInput, ImageProcessor, ModelRuntime, PixelValues, TextEncoding, TextTokenizer,
};
use crate::error::{PipelineError, Result};
use crate::factory::Backend;
use crate::model_config::ModelConfig;
use crate::resources::PipelineSpec;
use crate::tensor::{NamedTensors, Tensor};
use ndarray::{ArrayD, IxDyn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 100;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;
pub const MASK_ID: u32 = 103;
/// Ids of vocabulary words start here
pub const FIRST_WORD_ID: u32 = 1000;

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", PAD_ID),
    ("[UNK]", UNK_ID),
    ("[CLS]", CLS_ID),
    ("[SEP]", SEP_ID),
    ("[MASK]", MASK_ID),
];

/// BERT-style WordPiece tokenizer over a fixed word list
#[derive(Debug, Clone)]
pub struct MockTokenizer {
    vocab: BTreeMap<String, u32>,
    reverse: BTreeMap<u32, String>,
    lowercase: bool,
}

struct Piece {
    token: String,
    id: u32,
    offsets: Option<(usize, usize)>,
    word: Option<u32>,
}

impl MockTokenizer {
    /// Vocabulary words get ids from `FIRST_WORD_ID` in order; `##x` entries are continuations
    pub fn new(words: &[&str]) -> Self {
        let mut vocab = BTreeMap::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), id);
        }
        for (i, word) in words.iter().enumerate() {
            vocab.insert(word.to_string(), FIRST_WORD_ID + i as u32);
        }
        let reverse = vocab.iter().map(|(token, &id)| (id, token.clone())).collect();
        Self {
            vocab,
            reverse,
            lowercase: false,
        }
    }

    /// Lowercase words before vocabulary lookup (offsets still index the original text)
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Id of a vocabulary entry, `[UNK]` when absent
    pub fn id(&self, token: &str) -> u32 {
        self.vocab.get(token).copied().unwrap_or(UNK_ID)
    }

    fn pre_tokenize(text: &str) -> Vec<(usize, usize)> {
        let mut words = Vec::new();
        let mut start: Option<usize> = None;
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if text[i..].starts_with("[MASK]") {
                if let Some(s) = start.take() {
                    words.push((s, i));
                }
                words.push((i, i + "[MASK]".len()));
                for _ in 0.."[MASK]".len() - 1 {
                    chars.next();
                }
            } else if c.is_whitespace() {
                if let Some(s) = start.take() {
                    words.push((s, i));
                }
            } else if c.is_ascii_punctuation() {
                if let Some(s) = start.take() {
                    words.push((s, i));
                }
                words.push((i, i + c.len_utf8()));
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            words.push((s, text.len()));
        }
        words
    }

    fn word_pieces(&self, text: &str, (start, end): (usize, usize), word: u32) -> Vec<Piece> {
        let surface = &text[start..end];
        if surface == "[MASK]" {
            return vec![Piece {
                token: surface.to_string(),
                id: MASK_ID,
                offsets: Some((start, end)),
                word: Some(word),
            }];
        }

        let boundaries: Vec<usize> = surface
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(surface.len()))
            .collect();
        let mut pieces = Vec::new();
        let mut pos = 0usize;
        while pos < surface.len() {
            let found = boundaries.iter().rev().filter(|&&b| b > pos).find_map(|&b| {
                let fragment = &surface[pos..b];
                let fragment = if self.lowercase {
                    fragment.to_lowercase()
                } else {
                    fragment.to_string()
                };
                let token = if pos == 0 { fragment } else { format!("##{}", fragment) };
                self.vocab.get(&token).map(|&id| (token, id, b))
            });
            match found {
                Some((token, id, b)) => {
                    pieces.push(Piece {
                        token,
                        id,
                        offsets: Some((start + pos, start + b)),
                        word: Some(word),
                    });
                    pos = b;
                }
                None => {
                    return vec![Piece {
                        token: "[UNK]".to_string(),
                        id: UNK_ID,
                        offsets: Some((start, end)),
                        word: Some(word),
                    }]
                }
            }
        }
        pieces
    }

    fn sequence(&self, text: &str) -> Vec<Piece> {
        Self::pre_tokenize(text)
            .into_iter()
            .enumerate()
            .flat_map(|(w, span)| self.word_pieces(text, span, w as u32))
            .collect()
    }

    fn special(token: &str, id: u32) -> Piece {
        Piece {
            token: token.to_string(),
            id,
            offsets: None,
            word: None,
        }
    }

    fn assemble(parts: Vec<(Option<usize>, Piece)>) -> TextEncoding {
        let mut encoding = TextEncoding::default();
        for (sequence, piece) in parts {
            let special = piece.offsets.is_none();
            encoding.ids.push(piece.id);
            encoding.tokens.push(piece.token);
            encoding.offsets.push(piece.offsets);
            encoding.special_tokens_mask.push(special);
            encoding.attention_mask.push(1);
            encoding.type_ids.push(sequence.unwrap_or(0) as u32);
            encoding.word_ids.push(piece.word);
            encoding.sequence_ids.push(if special { None } else { sequence });
        }
        encoding
    }
}

impl TextTokenizer for MockTokenizer {
    fn encode(&self, text: &str) -> Result<TextEncoding> {
        let mut parts = vec![(None, Self::special("[CLS]", CLS_ID))];
        parts.extend(self.sequence(text).into_iter().map(|p| (Some(0), p)));
        parts.push((None, Self::special("[SEP]", SEP_ID)));
        Ok(Self::assemble(parts))
    }

    fn encode_pair(&self, first: &str, second: &str) -> Result<TextEncoding> {
        let mut parts = vec![(None, Self::special("[CLS]", CLS_ID))];
        parts.extend(self.sequence(first).into_iter().map(|p| (Some(0), p)));
        parts.push((None, Self::special("[SEP]", SEP_ID)));
        parts.extend(self.sequence(second).into_iter().map(|p| (Some(1), p)));
        parts.push((Some(1), Self::special("[SEP]", SEP_ID)));
        Ok(Self::assemble(parts))
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let mut text = String::new();
        for &id in ids {
            if skip_special_tokens && id < FIRST_WORD_ID {
                continue;
            }
            let token = self
                .reverse
                .get(&id)
                .ok_or_else(|| PipelineError::inference(format!("unknown id {}", id)))?;
            if let Some(rest) = token.strip_prefix("##") {
                text.push_str(rest);
            } else {
                let is_punct = token.chars().count() == 1 && token.chars().all(|c| c.is_ascii_punctuation());
                if !text.is_empty() && !is_punct {
                    text.push(' ');
                }
                text.push_str(token);
            }
        }
        Ok(text)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.reverse.get(&id).cloned()
    }

    fn mask_token(&self) -> Option<String> {
        self.vocab.contains_key("[MASK]").then(|| "[MASK]".to_string())
    }

    fn pad_token_id(&self) -> u32 {
        PAD_ID
    }
}

type RunHandler = dyn Fn(&NamedTensors) -> Result<NamedTensors> + Send + Sync;

/// Runtime whose outputs come from a closure; records every call
pub struct MockRuntime {
    input_names: Vec<String>,
    handler: Box<RunHandler>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<NamedTensors>>,
}

impl MockRuntime {
    pub fn new<F>(input_names: &[&str], handler: F) -> Self
    where
        F: Fn(&NamedTensors) -> Result<NamedTensors> + Send + Sync + 'static,
    {
        Self {
            input_names: input_names.iter().map(|name| name.to_string()).collect(),
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// A BERT-style text graph
    pub fn text<F>(handler: F) -> Self
    where
        F: Fn(&NamedTensors) -> Result<NamedTensors> + Send + Sync + 'static,
    {
        Self::new(&["input_ids", "attention_mask", "token_type_ids"], handler)
    }

    /// A vision graph taking `pixel_values`
    pub fn vision<F>(handler: F) -> Self
    where
        F: Fn(&NamedTensors) -> Result<NamedTensors> + Send + Sync + 'static,
    {
        Self::new(&["pixel_values"], handler)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_inputs(&self) -> Vec<NamedTensors> {
        self.inputs.lock().clone()
    }
}

impl ModelRuntime for MockRuntime {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.handler)(&inputs);
        self.inputs.lock().push(inputs);
        result
    }
}

/// Token ids of the first row of `input_ids`
pub fn input_ids(inputs: &NamedTensors) -> Vec<i64> {
    inputs
        .get("input_ids")
        .and_then(Tensor::as_i64)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

/// A float tensor with the given shape
pub fn f32_tensor(shape: &[usize], data: Vec<f32>) -> Tensor {
    match ArrayD::from_shape_vec(IxDyn(shape), data) {
        Ok(array) => Tensor::F32(array),
        Err(e) => panic!("bad mock tensor shape {:?}: {}", shape, e),
    }
}

/// Build a named output map
pub fn outputs(entries: Vec<(&str, Tensor)>) -> NamedTensors {
    entries
        .into_iter()
        .map(|(name, tensor)| (name.to_string(), tensor))
        .collect()
}

/// Returns zero pixels of a fixed size; empty byte buffers are malformed
#[derive(Debug, Clone)]
pub struct MockImageProcessor {
    height: usize,
    width: usize,
    calls: Arc<AtomicUsize>,
}

impl MockImageProcessor {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl ImageProcessor for MockImageProcessor {
    fn preprocess(&self, image: &ImageInput) -> Result<PixelValues> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let ImageInput::Bytes(bytes) = image {
            if bytes.is_empty() {
                return Err(PipelineError::input("malformed image: empty buffer"));
            }
        }
        Ok(PixelValues {
            tensor: ArrayD::zeros(IxDyn(&[1, 3, self.height, self.width])),
            original_size: (self.height as u32, self.width as u32),
        })
    }
}

/// Backend that returns the same mock adapters for every pipeline
pub struct MockBackend {
    pub tokenizer: Arc<MockTokenizer>,
    pub runtime: Arc<MockRuntime>,
    pub processor: Arc<MockImageProcessor>,
    pub config: ModelConfig,
    loaded: Mutex<Vec<PathBuf>>,
}

impl MockBackend {
    pub fn new(tokenizer: MockTokenizer, runtime: MockRuntime, config: ModelConfig) -> Self {
        Self {
            tokenizer: Arc::new(tokenizer),
            runtime: Arc::new(runtime),
            processor: Arc::new(MockImageProcessor::default()),
            config,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Paths handed to the backend, in load order
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.loaded.lock().clone()
    }
}

impl Backend for MockBackend {
    fn load_tokenizer(&self, path: &Path, _spec: &PipelineSpec) -> Result<Arc<dyn TextTokenizer>> {
        self.loaded.lock().push(path.to_path_buf());
        Ok(self.tokenizer.clone())
    }

    fn load_image_processor(&self, path: &Path, _spec: &PipelineSpec) -> Result<Arc<dyn ImageProcessor>> {
        self.loaded.lock().push(path.to_path_buf());
        Ok(self.processor.clone())
    }

    fn load_runtime(&self, path: &Path, _spec: &PipelineSpec) -> Result<Arc<dyn ModelRuntime>> {
        self.loaded.lock().push(path.to_path_buf());
        Ok(self.runtime.clone())
    }

    fn load_config(&self, path: &Path, _spec: &PipelineSpec) -> Result<ModelConfig> {
        self.loaded.lock().push(path.to_path_buf());
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> MockTokenizer {
        MockTokenizer::new(&["Ruby", "is", "a", "programming", "language", "created", "by", "Mat", "##z", "."])
    }

    #[test]
    fn test_wordpiece_split_and_offsets() {
        let text = "Ruby is a programming language created by Matz";
        let encoding = tokenizer().encode(text).unwrap();
        assert_eq!(encoding.len(), 11);
        assert_eq!(encoding.tokens[8], "Mat");
        assert_eq!(encoding.tokens[9], "##z");
        assert_eq!(encoding.offsets[8], Some((42, 45)));
        assert_eq!(encoding.offsets[9], Some((45, 46)));
        assert_eq!(encoding.word_ids[8], encoding.word_ids[9]);
        assert!(encoding.is_special(0) && encoding.is_special(10));
        assert_eq!(encoding.offsets[0], None);
    }

    #[test]
    fn test_pair_sequence_ids() {
        let encoding = tokenizer().encode_pair("Ruby", "is a").unwrap();
        assert_eq!(encoding.sequence_ids, vec![None, Some(0), None, Some(1), Some(1), None]);
        assert_eq!(encoding.type_ids, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_decode_merges_subwords() {
        let tok = tokenizer();
        let ids = [CLS_ID, tok.id("Mat"), tok.id("##z"), tok.id("."), SEP_ID];
        assert_eq!(tok.decode(&ids, true).unwrap(), "Matz.");
        assert_eq!(tok.decode(&ids, false).unwrap(), "[CLS] Matz. [SEP]");
    }

    #[test]
    fn test_mask_literal_and_unknown() {
        let encoding = MockTokenizer::new(&["ruby"]).lowercase().encode("RUBY [MASK] unknown").unwrap();
        assert_eq!(encoding.ids[1], FIRST_WORD_ID);
        assert_eq!(encoding.ids[2], MASK_ID);
        assert_eq!(encoding.ids[3], UNK_ID);
        assert_eq!(encoding.offsets[2], Some((5, 11)));
    }

    #[test]
    fn test_runtime_records_calls() {
        let runtime = MockRuntime::text(|_| Ok(outputs(vec![("logits", f32_tensor(&[1, 2], vec![0.0, 1.0]))])));
        let result = runtime.run(NamedTensors::new()).unwrap();
        assert_eq!(result["logits"].shape(), &[1, 2]);
        assert_eq!(runtime.calls(), 1);
    }

    #[test]
    fn test_image_processor_rejects_empty_bytes() {
        let processor = MockImageProcessor::default();
        assert!(processor.preprocess(&ImageInput::Bytes(Vec::new())).is_err());
        let pixels = processor.preprocess(&ImageInput::from("cat.png")).unwrap();
        assert_eq!(pixels.tensor.shape(), &[1, 3, 4, 4]);
    }
}
