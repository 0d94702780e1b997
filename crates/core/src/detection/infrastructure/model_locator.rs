use std::path::{Path, PathBuf};

use crate::shared::constants::MODEL_FILE_NAME;
use crate::shared::error::PipelineError;

/// Resolves the model artifact inside `model_dir`, or inside
/// [`default_model_dir`] when none is given.
///
/// Fails with `ModelNotFound` if no regular file exists at the resolved path.
pub fn locate(model_dir: Option<&Path>) -> Result<PathBuf, PipelineError> {
    let dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_model_dir(),
    };
    let path = dir.join(MODEL_FILE_NAME);
    if path.is_file() {
        log::debug!("Model resolved to {}", path.display());
        Ok(path)
    } else {
        Err(PipelineError::ModelNotFound { path })
    }
}

/// Directory holding the running executable.
///
/// Falls back to the working directory if the executable path is unknown.
pub fn default_model_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Sidecar labels file for a model: `last.onnx` -> `last.names`.
pub fn sidecar_labels_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("names")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_finds_model_in_dir() {
        let tmp = TempDir::new().unwrap();
        let model_path = tmp.path().join(MODEL_FILE_NAME);
        fs::write(&model_path, b"fake model data").unwrap();

        assert_eq!(locate(Some(tmp.path())).unwrap(), model_path);
    }

    #[test]
    fn test_locate_missing_model() {
        let tmp = TempDir::new().unwrap();
        let err = locate(Some(tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
        assert!(err.to_string().contains(MODEL_FILE_NAME));
    }

    #[test]
    fn test_locate_rejects_directory_with_model_name() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(MODEL_FILE_NAME)).unwrap();
        let err = locate(Some(tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    }

    #[test]
    fn test_default_model_dir_is_absolute_exe_dir() {
        let dir = default_model_dir();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(dir, exe.parent().unwrap());
    }

    #[test]
    fn test_sidecar_labels_path() {
        assert_eq!(
            sidecar_labels_path(Path::new("/models/last.onnx")),
            PathBuf::from("/models/last.names")
        );
    }
}
