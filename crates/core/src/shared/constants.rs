/// Model artifact looked up inside the model directory.
pub const MODEL_FILE_NAME: &str = "last.onnx";

/// Fixed name of the annotated video produced by a run.
pub const OUTPUT_FILE_NAME: &str = "annotated_output.mp4";

/// Suffix inserted before the extension of the in-progress output file.
pub const STAGING_SUFFIX: &str = "partial";

/// Ultralytics default prediction thresholds.
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const MAX_DETECTIONS: usize = 300;
