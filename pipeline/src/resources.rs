//! Resource acquisition
//!
//! Resolves every file a pipeline needs before any backend is loaded, emitting
//! an `Initiate`/`Done` pair per file. Acquisition never downloads: a store
//! only maps `(model, file)` onto something that already exists.

use crate::config::{Device, PipelineOptions, Settings};
use crate::error::{PipelineError, Result};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::types::Task;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// What a required file is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Tokenizer,
    Preprocessor,
    ModelConfig,
    Weights,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    pub kind: ResourceKind,
    /// Model reference the file belongs to
    pub repo: String,
    pub file: String,
}

/// Everything needed to build one pipeline; fixed once resolved
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub task: Task,
    pub model: String,
    pub tokenizer: String,
    pub files: Vec<ResourceFile>,
    pub device: Device,
    pub max_length: Option<usize>,
}

impl PipelineSpec {
    /// Resolve model references and the file list for `task`
    ///
    /// Model priority: explicit option, settings override, task default.
    pub fn resolve(task: Task, options: &PipelineOptions, settings: &Settings) -> Self {
        let model = options
            .model
            .clone()
            .or_else(|| settings.model_for(task).map(str::to_string))
            .unwrap_or_else(|| task.default_model().to_string());
        let tokenizer = options.tokenizer.clone().unwrap_or_else(|| model.clone());

        let mut files = Vec::new();
        if task.needs_tokenizer() {
            files.push(ResourceFile {
                kind: ResourceKind::Tokenizer,
                repo: tokenizer.clone(),
                file: TOKENIZER_FILE.to_string(),
            });
        }
        if task.needs_image_processor() {
            files.push(ResourceFile {
                kind: ResourceKind::Preprocessor,
                repo: tokenizer.clone(),
                file: PREPROCESSOR_FILE.to_string(),
            });
        }
        files.push(ResourceFile {
            kind: ResourceKind::ModelConfig,
            repo: model.clone(),
            file: CONFIG_FILE.to_string(),
        });
        files.push(ResourceFile {
            kind: ResourceKind::Weights,
            repo: model.clone(),
            file: options.weights_file(),
        });

        Self {
            task,
            model,
            tokenizer,
            files,
            device: options.device,
            max_length: options.max_length,
        }
    }
}

/// Maps `(model, file)` to a local path
pub trait ResourceStore: Send + Sync {
    fn resolve(&self, model: &str, file: &str) -> Result<PathBuf>;
}

/// A directory laid out as `<root>/<model>/<file>`
#[derive(Debug, Clone)]
pub struct LocalModelStore {
    root: PathBuf,
}

impl LocalModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the cache directory resolved from the environment
    pub fn from_env() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.cache_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceStore for LocalModelStore {
    fn resolve(&self, model: &str, file: &str) -> Result<PathBuf> {
        if model.split('/').any(|part| part == "..") || file.split('/').any(|part| part == "..") {
            return Err(PipelineError::resource(model, file, "path escapes the model store"));
        }
        let path = self.root.join(model).join(file);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::resource(
                model,
                file,
                format!("not found under {}", self.root.display()),
            ))
        }
    }
}

/// Local paths of every file a pipeline needs
#[derive(Debug, Clone)]
pub struct AcquiredResources {
    pub spec: PipelineSpec,
    paths: BTreeMap<ResourceKind, PathBuf>,
}

impl AcquiredResources {
    pub fn path(&self, kind: ResourceKind) -> Result<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path).ok_or_else(|| {
            PipelineError::config(format!(
                "{} pipelines do not acquire a {:?} file",
                self.spec.task, kind
            ))
        })
    }
}

/// Resolve every file in `spec`, reporting progress per file
pub fn acquire_resources(
    spec: &PipelineSpec,
    store: &dyn ResourceStore,
    progress: &mut dyn ProgressSink,
) -> Result<AcquiredResources> {
    let mut paths = BTreeMap::new();

    for resource in &spec.files {
        progress.on_event(ProgressEvent::Initiate {
            name: resource.repo.clone(),
            file: resource.file.clone(),
        });

        let path = store.resolve(&resource.repo, &resource.file)?;
        log::debug!("Resolved {}/{} -> {:?}", resource.repo, resource.file, path);

        progress.on_event(ProgressEvent::Done {
            name: resource.repo.clone(),
            file: resource.file.clone(),
        });
        paths.insert(resource.kind, path);
    }

    Ok(AcquiredResources {
        spec: spec.clone(),
        paths,
    })
}
