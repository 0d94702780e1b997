use ort::execution_providers::{ExecutionProvider, ExecutionProviderDispatch};

use crate::detection::domain::device::Device;

/// Returns true when ONNX Runtime can run on `device` in this process.
pub fn is_available(device: Device) -> bool {
    let probe = match device {
        Device::Cpu => return true,
        Device::Cuda => ort::execution_providers::CUDAExecutionProvider::default().is_available(),
        #[cfg(target_os = "macos")]
        Device::CoreMl => {
            ort::execution_providers::CoreMLExecutionProvider::default().is_available()
        }
        #[cfg(target_os = "windows")]
        Device::DirectMl => {
            ort::execution_providers::DirectMLExecutionProvider::default().is_available()
        }
        _ => return false,
    };
    match probe {
        Ok(available) => available,
        Err(e) => {
            log::debug!("Probing {device} execution provider failed: {e}");
            false
        }
    }
}

/// Execution providers to register for `device`.
///
/// Accelerators are registered with `error_on_failure` so a device that
/// cannot initialize surfaces as `DeviceUnavailable` and the caller decides
/// whether to try another one.
/// The CPU needs no provider; ONNX Runtime always includes it.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cpu => vec![],
        Device::Cuda => vec![ort::execution_providers::CUDAExecutionProvider::default()
            .build()
            .error_on_failure()],
        #[cfg(target_os = "macos")]
        Device::CoreMl => vec![ort::execution_providers::CoreMLExecutionProvider::default()
            .build()
            .error_on_failure()],
        #[cfg(target_os = "windows")]
        Device::DirectMl => vec![ort::execution_providers::DirectMLExecutionProvider::default()
            .build()
            .error_on_failure()],
        _ => vec![],
    }
}
