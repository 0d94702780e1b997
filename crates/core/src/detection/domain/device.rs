use std::fmt;
use std::str::FromStr;

use crate::shared::error::{ErrorKind, PipelineError};

/// Compute device the detector runs on.
///
/// `Cuda` needs an ONNX Runtime build with the CUDA provider. Enable the
/// `cuda` crate feature to fetch one on Linux; without it CUDA is never
/// reported as available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Device {
    /// Dedicated NVIDIA accelerator.
    Cuda,
    /// Apple Neural Engine / GPU.
    CoreMl,
    /// DirectX 12 GPU on Windows.
    DirectMl,
    Cpu,
}

impl Device {
    /// Most capable first. The CPU is always last and always available.
    pub const PREFERENCE_ORDER: [Device; 4] =
        [Device::Cuda, Device::CoreMl, Device::DirectMl, Device::Cpu];

    pub fn name(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::CoreMl => "coreml",
            Device::DirectMl => "directml",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Cuda),
            "coreml" | "mps" => Ok(Device::CoreMl),
            "directml" | "dml" => Ok(Device::DirectMl),
            "cpu" => Ok(Device::Cpu),
            other => Err(format!(
                "unknown device '{other}', expected one of: cuda, coreml, directml, cpu"
            )),
        }
    }
}

/// Devices to try, in order, once before any frame is processed.
///
/// An explicit `requested` device must pass `is_available` or the run fails
/// with `DeviceUnavailable`; it is then the only candidate. Without one, every
/// available device in [`Device::PREFERENCE_ORDER`] is listed, ending at the CPU.
pub fn candidate_devices(
    requested: Option<Device>,
    is_available: impl Fn(Device) -> bool,
) -> Result<Vec<Device>, PipelineError> {
    if let Some(device) = requested {
        if device == Device::Cpu || is_available(device) {
            return Ok(vec![device]);
        }
        return Err(PipelineError::DeviceUnavailable {
            device: device.to_string(),
            reason: "execution provider is not available on this system".to_string(),
        });
    }

    Ok(Device::PREFERENCE_ORDER
        .into_iter()
        .filter(|&d| d == Device::Cpu || is_available(d))
        .collect())
}

/// Runs `load` on the best candidate device and returns the device it
/// succeeded on.
///
/// An available provider can still fail to initialize (a DirectML build on a
/// machine without a DX12 GPU). With no `requested` device, a
/// `DeviceUnavailable` from `load` moves on to the next candidate. An explicit
/// request is never swapped for another device.
pub fn load_on_best_device<T>(
    requested: Option<Device>,
    is_available: impl Fn(Device) -> bool,
    mut load: impl FnMut(Device) -> Result<T, PipelineError>,
) -> Result<(Device, T), PipelineError> {
    let candidates = candidate_devices(requested, is_available)?;
    let mut last_error = None;
    for device in candidates {
        match load(device) {
            Ok(loaded) => return Ok((device, loaded)),
            Err(e) if requested.is_none() && e.kind() == ErrorKind::DeviceUnavailable => {
                log::warn!("{device} failed to initialize, trying the next device: {e}");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error.unwrap_or_else(|| PipelineError::DeviceUnavailable {
        device: Device::Cpu.to_string(),
        reason: "no device could be initialized".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::RefCell;

    fn init_failure(device: Device) -> PipelineError {
        PipelineError::DeviceUnavailable {
            device: device.to_string(),
            reason: "provider failed to initialize".to_string(),
        }
    }

    #[test]
    fn test_automatic_load_falls_back_past_failing_providers() {
        let attempts = RefCell::new(Vec::new());
        let (device, loaded) = load_on_best_device(
            None,
            |d| matches!(d, Device::Cuda | Device::DirectMl),
            |d| {
                attempts.borrow_mut().push(d);
                match d {
                    Device::Cpu => Ok("session"),
                    other => Err(init_failure(other)),
                }
            },
        )
        .unwrap();

        assert_eq!(device, Device::Cpu);
        assert_eq!(loaded, "session");
        assert_eq!(
            attempts.into_inner(),
            vec![Device::Cuda, Device::DirectMl, Device::Cpu]
        );
    }

    #[test]
    fn test_automatic_load_stops_at_first_working_device() {
        let attempts = RefCell::new(Vec::new());
        let (device, _) = load_on_best_device(
            None,
            |_| true,
            |d| {
                attempts.borrow_mut().push(d);
                if d == Device::Cuda {
                    Err(init_failure(d))
                } else {
                    Ok(())
                }
            },
        )
        .unwrap();

        assert_eq!(device, Device::CoreMl);
        assert_eq!(attempts.into_inner(), vec![Device::Cuda, Device::CoreMl]);
    }

    #[test]
    fn test_requested_device_failure_is_not_retried() {
        let attempts = RefCell::new(Vec::new());
        let err = load_on_best_device(
            Some(Device::DirectMl),
            |_| true,
            |d| -> Result<(), PipelineError> {
                attempts.borrow_mut().push(d);
                Err(init_failure(d))
            },
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(attempts.into_inner(), vec![Device::DirectMl]);
    }

    #[test]
    fn test_automatic_load_propagates_other_errors() {
        let err = load_on_best_device(
            None,
            |_| true,
            |_| -> Result<(), PipelineError> {
                Err(PipelineError::ModelNotFound {
                    path: "last.onnx".into(),
                })
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    }

    #[rstest]
    #[case::nothing(&[], Device::Cpu)]
    #[case::cuda_only(&[Device::Cuda], Device::Cuda)]
    #[case::apple(&[Device::CoreMl], Device::CoreMl)]
    #[case::cuda_beats_coreml(&[Device::CoreMl, Device::Cuda], Device::Cuda)]
    #[case::windows(&[Device::DirectMl], Device::DirectMl)]
    fn test_automatic_resolution(#[case] available: &[Device], #[case] expected: Device) {
        let candidates = candidate_devices(None, |d| available.contains(&d)).unwrap();
        assert_eq!(candidates[0], expected);
        assert_eq!(candidates.last(), Some(&Device::Cpu));
    }

    #[test]
    fn test_override_wins_when_available() {
        let candidates = candidate_devices(Some(Device::CoreMl), |_| true).unwrap();
        assert_eq!(candidates, vec![Device::CoreMl]);
    }

    #[test]
    fn test_cpu_override_never_fails() {
        let candidates = candidate_devices(Some(Device::Cpu), |_| false).unwrap();
        assert_eq!(candidates, vec![Device::Cpu]);
    }

    #[test]
    fn test_unavailable_override_fails() {
        let err = candidate_devices(Some(Device::Cuda), |_| false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(err.to_string().contains("cuda"));
    }

    #[rstest]
    #[case("cuda", Device::Cuda)]
    #[case("MPS", Device::CoreMl)]
    #[case(" coreml ", Device::CoreMl)]
    #[case("dml", Device::DirectMl)]
    #[case("cpu", Device::Cpu)]
    fn test_parse(#[case] input: &str, #[case] expected: Device) {
        assert_eq!(input.parse::<Device>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for device in Device::PREFERENCE_ORDER {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }
}
