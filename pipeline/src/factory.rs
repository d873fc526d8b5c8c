//! Pipeline factory - task id in, loaded pipeline out
//!
//! **Composable**: the factory resolves the spec, runs the acquisition step
//! against a `ResourceStore`, and hands the acquired files to a `Backend`.
//! It never touches file formats itself.

use crate::adapters::{ImageProcessor, ModelRuntime, TextTokenizer};
use crate::base::{TextModel, VisionModel};
use crate::config::{PipelineOptions, Settings};
use crate::dispatch::Pipeline;
use crate::error::{PipelineError, Result};
use crate::model_config::ModelConfig;
use crate::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::resources::{
    acquire_resources, AcquiredResources, PipelineSpec, ResourceKind, ResourceStore, CONFIG_FILE,
};
use crate::types::Task;
use std::path::Path;
use std::sync::Arc;

/// Adapters loaded for one pipeline
pub struct LoadedModel {
    pub tokenizer: Option<Arc<dyn TextTokenizer>>,
    pub processor: Option<Arc<dyn ImageProcessor>>,
    pub runtime: Arc<dyn ModelRuntime>,
    pub config: ModelConfig,
}

impl LoadedModel {
    pub fn tokenizer(&self) -> Result<Arc<dyn TextTokenizer>> {
        self.tokenizer
            .clone()
            .ok_or_else(|| PipelineError::config("pipeline requires a tokenizer"))
    }

    pub fn processor(&self) -> Result<Arc<dyn ImageProcessor>> {
        self.processor
            .clone()
            .ok_or_else(|| PipelineError::config("pipeline requires an image processor"))
    }

    pub fn text_model(self) -> Result<TextModel> {
        Ok(TextModel::new(self.tokenizer()?, self.runtime, self.config))
    }

    pub fn vision_model(self) -> Result<VisionModel> {
        Ok(VisionModel::new(self.processor()?, self.runtime, self.config))
    }
}

/// Turns acquired files into loaded adapters
pub trait Backend: Send + Sync {
    fn load_tokenizer(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn TextTokenizer>>;

    fn load_image_processor(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn ImageProcessor>>;

    fn load_runtime(&self, path: &Path, spec: &PipelineSpec) -> Result<Arc<dyn ModelRuntime>>;

    fn load_config(&self, path: &Path, spec: &PipelineSpec) -> Result<ModelConfig> {
        ModelConfig::from_file(path).map_err(|e| PipelineError::resource(&spec.model, CONFIG_FILE, e))
    }

    /// Load every adapter the acquired files describe
    fn load(&self, resources: &AcquiredResources) -> Result<LoadedModel> {
        let spec = &resources.spec;
        let tokenizer = if spec.task.needs_tokenizer() {
            Some(self.load_tokenizer(resources.path(ResourceKind::Tokenizer)?, spec)?)
        } else {
            None
        };
        let processor = if spec.task.needs_image_processor() {
            Some(self.load_image_processor(resources.path(ResourceKind::Preprocessor)?, spec)?)
        } else {
            None
        };
        let config = self.load_config(resources.path(ResourceKind::ModelConfig)?, spec)?;
        let runtime = self.load_runtime(resources.path(ResourceKind::Weights)?, spec)?;

        Ok(LoadedModel {
            tokenizer,
            processor,
            runtime,
            config,
        })
    }
}

/// Factory for task pipelines
pub struct PipelineFactory {
    store: Arc<dyn ResourceStore>,
    backend: Arc<dyn Backend>,
    settings: Settings,
}

impl PipelineFactory {
    pub fn new(store: impl ResourceStore + 'static, backend: impl Backend + 'static) -> Self {
        Self {
            store: Arc::new(store),
            backend: Arc::new(backend),
            settings: Settings::default(),
        }
    }

    /// Per-task model overrides from a settings file
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the pipeline for a task id or alias
    pub fn create(&self, task: &str, options: PipelineOptions) -> Result<Pipeline> {
        let task: Task = task.parse()?;
        self.create_task(task, options)
    }

    pub fn create_task(&self, task: Task, mut options: PipelineOptions) -> Result<Pipeline> {
        let spec = PipelineSpec::resolve(task, &options, &self.settings);
        log::info!("Loading {} pipeline with model {}", task, spec.model);

        let mut progress: Box<dyn ProgressSink> =
            options.progress.take().unwrap_or_else(|| Box::new(NoProgress));

        let resources = acquire_resources(&spec, self.store.as_ref(), progress.as_mut())?;
        let loaded = self.backend.load(&resources)?;
        let pipeline = Pipeline::build(task, loaded)?;

        progress.on_event(ProgressEvent::Ready {
            task: task.as_str().to_string(),
            model: spec.model.clone(),
        });
        log::info!("{} pipeline ready", task);

        Ok(pipeline)
    }
}
