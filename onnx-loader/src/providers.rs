//! Device selection for ONNX Runtime sessions
//!
//! Maps the device hint a caller passes when building a pipeline onto ort
//! execution providers. CPU is always appended as the fallback provider.

use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use serde::{Deserialize, Serialize};

/// Where inference should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda { device_id: i32 },
}

impl Device {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda { .. } => "cuda",
        }
    }
}

/// Execution providers for `device`, in priority order
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();

    match device {
        Device::Cpu => {}
        Device::Cuda { device_id } => {
            #[cfg(feature = "cuda")]
            {
                let cuda = ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(device_id);
                log::info!("Configured CUDA provider on device {}", device_id);
                providers.push(cuda.build());
            }
            #[cfg(not(feature = "cuda"))]
            {
                log::warn!(
                    "CUDA device {} requested but cuda feature not enabled, falling back to CPU",
                    device_id
                );
            }
        }
    }

    providers.push(CPUExecutionProvider::default().build());
    providers
}
