use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause attached to pipeline errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every way a video processing run can fail.
///
/// All variants are fatal to the current run; nothing is retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot open video source {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("model file not found: {path}")]
    ModelNotFound { path: PathBuf },
    #[error("failed to load model {path}: {source}")]
    InvalidModel {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("compute device {device} is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("cannot open video sink {path}: {source}")]
    SinkUnwritable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to decode frame {frame_index}: {source}")]
    DecodeFailure {
        frame_index: usize,
        #[source]
        source: BoxError,
    },
    #[error("detection failed on frame {frame_index}: {source}")]
    InferenceFailure {
        frame_index: usize,
        #[source]
        source: BoxError,
    },
    #[error("failed to encode frame {frame_index}: {source}")]
    EncodeFailure {
        frame_index: usize,
        #[source]
        source: BoxError,
    },
    #[error("frame {frame_index} is {actual_width}x{actual_height}, sink expects {expected_width}x{expected_height}")]
    GeometryMismatch {
        frame_index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fieldless view of [`PipelineError`] for callers that only branch on the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    ModelNotFound,
    InvalidModel,
    DeviceUnavailable,
    SinkUnwritable,
    DecodeFailure,
    InferenceFailure,
    EncodeFailure,
    GeometryMismatch,
    Io,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PipelineError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            PipelineError::InvalidModel { .. } => ErrorKind::InvalidModel,
            PipelineError::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            PipelineError::SinkUnwritable { .. } => ErrorKind::SinkUnwritable,
            PipelineError::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            PipelineError::InferenceFailure { .. } => ErrorKind::InferenceFailure,
            PipelineError::EncodeFailure { .. } => ErrorKind::EncodeFailure,
            PipelineError::GeometryMismatch { .. } => ErrorKind::GeometryMismatch,
            PipelineError::Io { .. } => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = PipelineError::ModelNotFound {
            path: PathBuf::from("/models/last.onnx"),
        };
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    }

    #[test]
    fn test_display_includes_context() {
        let err = PipelineError::GeometryMismatch {
            frame_index: 3,
            expected_width: 640,
            expected_height: 480,
            actual_width: 320,
            actual_height: 240,
        };
        let msg = err.to_string();
        assert!(msg.contains("frame 3"));
        assert!(msg.contains("320x240"));
        assert!(msg.contains("640x480"));
    }

    #[test]
    fn test_source_is_exposed() {
        let err = PipelineError::DecodeFailure {
            frame_index: 7,
            source: "corrupt packet".into(),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "corrupt packet");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
