//! Command-line arguments for the taskpipe runner.
//!
//! Priority for every setting:
//! - CLI arguments (highest)
//! - Environment variables
//! - Settings file (`taskpipe.toml`)
//! - Task defaults (lowest)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use taskpipe_pipeline::{Device, PipelineOptions, Settings};

#[derive(Parser, Debug, Clone)]
#[command(name = "taskpipe")]
#[command(about = "Run task pipelines over local pretrained transformer models")]
#[command(version)]
pub struct CliArgs {
    /// Settings file with cache_dir and per-task model overrides
    #[arg(long, short = 'c', env = "TASKPIPE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List supported tasks and their default models
    Tasks,
    /// Load a pipeline and run it on one input (or a JSON array of inputs)
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Task id or alias (e.g. ner, sentiment-analysis, embedding)
    pub task: String,

    /// Plain text, an image path, or JSON (object input or array batch)
    pub input: String,

    /// Per-call options as a JSON object
    #[arg(long, short = 'o')]
    pub options: Option<String>,

    /// Model reference under the cache directory
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Tokenizer / preprocessor reference, defaults to the model
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Weights file relative to the model directory
    #[arg(long)]
    pub model_file: Option<String>,

    /// Load the quantized export
    #[arg(long, default_value_t = false)]
    pub quantized: bool,

    /// Device hint for the runtime
    #[arg(long, value_enum, default_value = "cpu", env = "TASKPIPE_DEVICE")]
    pub device: DeviceArg,

    /// Accelerator index when --device is not cpu
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Truncate encodings to this many tokens
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Model cache directory (overrides the settings file)
    #[arg(long, env = "TASKPIPE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Print load progress events to stderr as JSON lines
    #[arg(long, default_value_t = false)]
    pub progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Cpu,
    Cuda,
}

impl CliArgs {
    /// Settings from the file given with --config, defaults otherwise
    pub fn settings(&self) -> Result<Settings> {
        match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("Failed to load settings from {:?}", path)),
            None => Ok(Settings::default()),
        }
    }
}

impl RunArgs {
    /// Pipeline construction options; the progress sink is attached by the caller
    pub fn pipeline_options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::new()
            .quantized(self.quantized)
            .with_device(match self.device {
                DeviceArg::Cpu => Device::Cpu,
                DeviceArg::Cuda => Device::Cuda {
                    device_id: self.device_id,
                },
            });
        if let Some(model) = &self.model {
            options = options.with_model(model);
        }
        if let Some(tokenizer) = &self.tokenizer {
            options = options.with_tokenizer(tokenizer);
        }
        if let Some(file) = &self.model_file {
            options = options.with_model_file(file);
        }
        if let Some(max_length) = self.max_length {
            options = options.with_max_length(max_length);
        }
        options
    }

    /// Input as JSON: objects and arrays are parsed, anything else is a string
    pub fn input_value(&self) -> Value {
        let trimmed = self.input.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(&self.input) {
                return value;
            }
        }
        Value::String(self.input.clone())
    }

    pub fn options_value(&self) -> Result<Value> {
        match &self.options {
            Some(raw) => serde_json::from_str(raw).context("--options must be a JSON object"),
            None => Ok(Value::Null),
        }
    }
}
