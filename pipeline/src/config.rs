//! Pipeline construction options and on-disk settings
//!
//! Priority for the model cache directory:
//! - `TASKPIPE_CACHE_DIR` environment variable (highest)
//! - `cache_dir` in the settings file
//! - platform cache directory + `taskpipe/models` (lowest)

use crate::error::{PipelineError, Result};
use crate::progress::ProgressSink;
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CACHE_DIR_ENV: &str = "TASKPIPE_CACHE_DIR";
pub const DEFAULT_MODEL_FILE: &str = "onnx/model.onnx";
pub const QUANTIZED_MODEL_FILE: &str = "onnx/model_quantized.onnx";

/// Device hint forwarded to the model runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda { device_id: i32 },
}

/// Options for building one pipeline
#[derive(Default)]
pub struct PipelineOptions {
    /// Model reference; the task's default model when unset
    pub model: Option<String>,
    /// Tokenizer/processor reference; the model reference when unset
    pub tokenizer: Option<String>,
    /// Weights file inside the model directory
    pub model_file: Option<String>,
    /// Select the quantized export when `model_file` is unset
    pub quantized: bool,
    pub device: Device,
    /// Truncate encodings to this many tokens
    pub max_length: Option<usize>,
    pub progress: Option<Box<dyn ProgressSink>>,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    pub fn with_model_file(mut self, file: impl Into<String>) -> Self {
        self.model_file = Some(file.into());
        self
    }

    pub fn quantized(mut self, quantized: bool) -> Self {
        self.quantized = quantized;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// The weights file to load: explicit file, else quantized, else the default export
    pub fn weights_file(&self) -> String {
        match &self.model_file {
            Some(file) => file.clone(),
            None if self.quantized => QUANTIZED_MODEL_FILE.to_string(),
            None => DEFAULT_MODEL_FILE.to_string(),
        }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("model", &self.model)
            .field("tokenizer", &self.tokenizer)
            .field("model_file", &self.model_file)
            .field("quantized", &self.quantized)
            .field("device", &self.device)
            .field("max_length", &self.max_length)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Settings file (`taskpipe.toml`)
///
/// ```toml
/// cache_dir = "/var/cache/models"
///
/// [models]
/// embedding = "Xenova/bge-small-en-v1.5"
/// ner = "Xenova/bert-base-multilingual-cased-ner-hrl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cache_dir: Option<PathBuf>,
    /// Task id (or alias) to model reference
    pub models: BTreeMap<String, String>,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(raw)
            .map_err(|e| PipelineError::config(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        for task in self.models.keys() {
            if Task::from_id(task).is_none() {
                return Err(PipelineError::config(format!(
                    "Unknown task in [models]: {}",
                    task
                )));
            }
        }
        Ok(())
    }

    /// Configured model for `task`, looked up by canonical id or alias
    pub fn model_for(&self, task: Task) -> Option<&str> {
        self.models
            .iter()
            .find(|(id, _)| Task::from_id(id) == Some(task))
            .map(|(_, model)| model.as_str())
    }

    /// Resolved model cache directory
    pub fn cache_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        default_cache_dir()
    }
}

/// Platform cache directory for models
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskpipe")
        .join("models")
}
