//! ONNX backend - composes the tokenization, vision and onnx-loader crates
//!
//! **Composable**: nothing here reimplements tokenization, image handling or
//! inference. Each adapter converts between the pipeline seams and the crate
//! it wraps, and maps that crate's error enum into `PipelineError`.

use crate::adapters::{
    ImageInput, ImageProcessor, ModelRuntime, PixelValues, TextEncoding, TextTokenizer,
};
use crate::config::Device;
use crate::error::{PipelineError, Result};
use crate::factory::Backend;
use crate::resources::{PipelineSpec, PREPROCESSOR_FILE, TOKENIZER_FILE};
use crate::tensor::{NamedTensors, Tensor};
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use std::sync::Arc;
use taskpipe_onnx_loader::{
    Device as OnnxDevice, InputTensor, OnnxError, OnnxSession, SessionOptions,
};
use taskpipe_tokenization::{Encoding, TokenizationError, Tokenizer};
use taskpipe_vision::{ImagePreprocessor, VisionError};

const DEFAULT_MAX_LENGTH: usize = 512;

/// Loads `tokenizer.json` with HF tokenizers, `preprocessor_config.json` with
/// the vision crate and the weights with ONNX Runtime
#[derive(Debug, Clone)]
pub struct OnnxBackend {
    pub intra_threads: usize,
    pub inter_threads: usize,
}

impl Default for OnnxBackend {
    fn default() -> Self {
        let defaults = SessionOptions::default();
        Self {
            intra_threads: defaults.intra_threads,
            inter_threads: defaults.inter_threads,
        }
    }
}

impl OnnxBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_options(&self, device: Device) -> SessionOptions {
        SessionOptions {
            device: match device {
                Device::Cpu => OnnxDevice::Cpu,
                Device::Cuda { device_id } => OnnxDevice::Cuda { device_id },
            },
            intra_threads: self.intra_threads,
            inter_threads: self.inter_threads,
        }
    }
}

impl Backend for OnnxBackend {
    fn load_tokenizer(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn TextTokenizer>> {
        let max_length = spec.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
        let tokenizer = Tokenizer::from_file(path)
            .and_then(|t| t.with_max_length(max_length))
            .map_err(|e| PipelineError::resource(&spec.tokenizer, TOKENIZER_FILE, e))?;
        Ok(Arc::new(HfTextTokenizer { inner: tokenizer }))
    }

    fn load_image_processor(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn ImageProcessor>> {
        let preprocessor = ImagePreprocessor::from_config_file(path)
            .map_err(|e| PipelineError::resource(&spec.tokenizer, PREPROCESSOR_FILE, e))?;
        Ok(Arc::new(VisionImageProcessor { inner: preprocessor }))
    }

    fn load_runtime(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn ModelRuntime>> {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let session = OnnxSession::load(path, &self.session_options(spec.device))
            .map_err(|e| PipelineError::resource(&spec.model, file, e))?;
        Ok(Arc::new(OnnxRuntime { session }))
    }
}

fn tokenization_error(err: TokenizationError) -> PipelineError {
    match err {
        TokenizationError::Encode(msg) => PipelineError::InputValidation(msg),
        other => PipelineError::Inference(other.to_string()),
    }
}

/// `TextTokenizer` over HF tokenizers
struct HfTextTokenizer {
    inner: Tokenizer,
}

impl HfTextTokenizer {
    fn convert(encoding: &Encoding) -> TextEncoding {
        let special_tokens_mask: Vec<bool> = encoding
            .get_special_tokens_mask()
            .iter()
            .map(|&m| m == 1)
            .collect();
        let offsets = encoding
            .get_offsets()
            .iter()
            .zip(&special_tokens_mask)
            .map(|(&offsets, &special)| if special { None } else { Some(offsets) })
            .collect();
        TextEncoding {
            ids: encoding.get_ids().to_vec(),
            tokens: encoding.get_tokens().to_vec(),
            offsets,
            special_tokens_mask,
            attention_mask: encoding.get_attention_mask().to_vec(),
            type_ids: encoding.get_type_ids().to_vec(),
            word_ids: encoding.get_word_ids().to_vec(),
            sequence_ids: encoding.get_sequence_ids(),
        }
    }
}

impl TextTokenizer for HfTextTokenizer {
    fn encode(&self, text: &str) -> Result<TextEncoding> {
        let encoding = self.inner.encode(text, true).map_err(tokenization_error)?;
        Ok(Self::convert(&encoding))
    }

    fn encode_pair(&self, first: &str, second: &str) -> Result<TextEncoding> {
        let encoding = self
            .inner
            .encode_pair(first, second, true)
            .map_err(tokenization_error)?;
        Ok(Self::convert(&encoding))
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(tokenization_error)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    fn mask_token(&self) -> Option<String> {
        self.inner.mask_token().map(str::to_string)
    }

    fn pad_token_id(&self) -> u32 {
        self.inner
            .pad_token_id()
            .or_else(|| self.inner.eos_token_id())
            .unwrap_or(0)
    }
}

/// `ImageProcessor` over the vision crate
struct VisionImageProcessor {
    inner: ImagePreprocessor,
}

impl ImageProcessor for VisionImageProcessor {
    fn preprocess(&self, image: &ImageInput) -> Result<PixelValues> {
        let processed = match image {
            ImageInput::Path(path) => self.inner.preprocess_path(path),
            ImageInput::Bytes(bytes) => self.inner.preprocess_bytes(bytes),
        }
        .map_err(|e| match e {
            VisionError::DecodeFailed(_) | VisionError::InvalidImage(_) | VisionError::Io(_) => {
                PipelineError::InputValidation(e.to_string())
            }
            other => PipelineError::Inference(other.to_string()),
        })?;
        Ok(PixelValues {
            tensor: processed.pixel_values.into_dyn(),
            original_size: processed.original_size,
        })
    }
}

/// `ModelRuntime` over an ONNX Runtime session
struct OnnxRuntime {
    session: OnnxSession,
}

impl ModelRuntime for OnnxRuntime {
    fn input_names(&self) -> Vec<String> {
        self.session.input_names().to_vec()
    }

    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors> {
        let inputs = inputs
            .into_iter()
            .map(|(name, tensor)| {
                let tensor = match tensor {
                    Tensor::I64(array) => InputTensor::Int64(array),
                    Tensor::F32(array) => InputTensor::Float32(array),
                };
                (name, tensor)
            })
            .collect();

        let outputs = self.session.run(inputs).map_err(|e| match e {
            OnnxError::InvalidInput(msg) => PipelineError::Inference(format!("invalid model input: {}", msg)),
            other => PipelineError::Inference(other.to_string()),
        })?;

        outputs
            .into_iter()
            .map(|(name, output)| {
                let array = ArrayD::from_shape_vec(IxDyn(&output.shape), output.data)
                    .map_err(|e| PipelineError::inference(format!("output {}: {}", name, e)))?;
                Ok((name, Tensor::F32(array)))
            })
            .collect()
    }
}
