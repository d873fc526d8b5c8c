//! ONNX Session management with named tensor inputs and outputs

use crate::error::{OnnxError, Result};
use crate::providers::{self, Device};
use ndarray::ArrayD;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session construction settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub device: Device,
    pub intra_threads: usize,
    pub inter_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            intra_threads: 4,
            inter_threads: 2,
        }
    }
}

/// An input tensor, in the element types transformer exports use
#[derive(Debug, Clone)]
pub enum InputTensor {
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
}

impl InputTensor {
    fn into_value(self) -> Result<DynValue> {
        let value = match self {
            InputTensor::Int64(array) => Tensor::from_array(array)
                .map_err(|e| OnnxError::InvalidInput(format!("Failed to create i64 tensor: {}", e)))?
                .into_dyn(),
            InputTensor::Float32(array) => Tensor::from_array(array)
                .map_err(|e| OnnxError::InvalidInput(format!("Failed to create f32 tensor: {}", e)))?
                .into_dyn(),
        };
        Ok(value)
    }
}

/// A float output copied out of the session
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// ONNX inference session
///
/// Thin wrapper around `ort::Session`: sensible defaults (Level3
/// optimization, 4/2 threads), device selection, and a run call that speaks
/// owned `ndarray` inputs and owned `f32` outputs so callers never touch ort
/// value lifetimes. The session is behind a mutex; concurrent `run` calls are
/// serialised.
#[derive(Clone)]
pub struct OnnxSession {
    model_path: PathBuf,
    input_names: Vec<String>,
    output_names: Vec<String>,
    session: Arc<Mutex<Session>>,
}

impl OnnxSession {
    /// Load an ONNX model
    pub fn load<P: AsRef<Path>>(model_path: P, options: &SessionOptions) -> Result<Self> {
        let model_path = model_path.as_ref();
        log::info!("Loading ONNX model from: {:?}", model_path);

        if !model_path.exists() {
            return Err(OnnxError::ModelLoadFailed(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let ort_providers = providers::execution_providers(options.device);
        log::info!(
            "Configuring session with {} execution providers for {}",
            ort_providers.len(),
            options.device.name()
        );

        let session = Session::builder()
            .map_err(|e| OnnxError::SessionCreationFailed(e.to_string()))?
            .with_execution_providers(ort_providers)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set execution providers: {}", e)
            ))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set optimization level: {}", e)
            ))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set intra threads: {}", e)
            ))?
            .with_inter_threads(options.inter_threads)
            .map_err(|e| OnnxError::SessionCreationFailed(
                format!("Failed to set inter threads: {}", e)
            ))?
            .commit_from_file(model_path)
            .map_err(|e| OnnxError::ModelLoadFailed(e.to_string()))?;

        let input_names: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|output| output.name.clone()).collect();

        log::info!("ONNX model loaded successfully");
        log::debug!("  - inputs: {:?}", input_names);
        log::debug!("  - outputs: {:?}", output_names);

        Ok(Self {
            model_path: model_path.to_path_buf(),
            input_names,
            output_names,
            session: Arc::new(Mutex::new(session)),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Input names the graph declares, in graph order
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Run the graph once and copy every f32 output out of the session
    ///
    /// Outputs of other element types are skipped.
    pub fn run(&self, inputs: Vec<(String, InputTensor)>) -> Result<Vec<(String, OutputTensor)>> {
        for (name, _) in &inputs {
            if !self.input_names.contains(name) {
                return Err(OnnxError::InvalidInput(format!(
                    "Model does not declare an input named {}",
                    name
                )));
            }
        }

        let mut values: Vec<(String, DynValue)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            values.push((name, tensor.into_value()?));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(values)
            .map_err(|e| OnnxError::InferenceFailed(e.to_string()))?;

        collect_float_outputs(&self.output_names, |name| {
            outputs.get(name).map(|value| {
                value
                    .try_extract_tensor::<f32>()
                    .map(|(shape, data)| OutputTensor {
                        shape: shape.iter().map(|&dim| dim as usize).collect(),
                        data: data.to_vec(),
                    })
                    .map_err(|e| e.to_string())
            })
        })
    }
}

/// Gather the f32 outputs among `names`
///
/// `extract` yields `None` when the session produced no value for a name
/// (an error) and `Some(Err(_))` when the value is not an f32 tensor
/// (skipped, e.g. int64 or f16 auxiliary outputs).
fn collect_float_outputs<F>(names: &[String], mut extract: F) -> Result<Vec<(String, OutputTensor)>>
where
    F: FnMut(&str) -> Option<std::result::Result<OutputTensor, String>>,
{
    let mut extracted = Vec::with_capacity(names.len());
    for name in names {
        match extract(name) {
            None => return Err(OnnxError::MissingOutput(name.clone())),
            Some(Err(reason)) => {
                log::debug!("Skipping non-f32 output {}: {}", name, reason);
            }
            Some(Ok(tensor)) => {
                log::debug!("Output {} has shape {:?}", name, tensor.shape);
                extracted.push((name.clone(), tensor));
            }
        }
    }
    Ok(extracted)
}
