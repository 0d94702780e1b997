use std::path::{Path, PathBuf};

use crate::annotation::infrastructure::box_label_annotator::BoxLabelAnnotator;
use crate::detection::domain::class_names::ClassNames;
use crate::detection::domain::device::{load_on_best_device, Device};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::detection::infrastructure::execution_provider;
use crate::detection::infrastructure::model_locator;
use crate::detection::infrastructure::onnx_yolo_detector::{DetectorSettings, OnnxYoloDetector};
use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_IOU_THRESHOLD, MAX_DETECTIONS, OUTPUT_FILE_NAME,
};
use crate::shared::error::PipelineError;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;

use super::pipeline_driver::{PipelineDriver, RunReport};
use super::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};

/// Settings for one `processVideo` run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessVideoConfig {
    /// Directory holding `last.onnx`. `None` means next to the executable.
    pub model_dir: Option<PathBuf>,
    /// Device override. `None` picks the best available device.
    pub device: Option<Device>,
    pub confidence: f32,
    pub iou_threshold: f32,
    /// Newline-separated class names; falls back to the model's `.names` sidecar.
    pub labels: Option<PathBuf>,
    /// Where `annotated_output.mp4` is written.
    pub output_dir: PathBuf,
}

impl Default for ProcessVideoConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            device: None,
            confidence: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            labels: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ProcessVideoConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILE_NAME)
    }
}

/// Annotates every frame of a video with the detector's boxes and labels.
///
/// Resolves the model and class names, then loads the detector on the best
/// device that initializes, all before the source is opened. Single-use: `execute` hands the logger to the driver.
pub struct ProcessVideoUseCase {
    config: ProcessVideoConfig,
    logger: Option<Box<dyn PipelineLogger>>,
}

impl ProcessVideoUseCase {
    pub fn new(config: ProcessVideoConfig) -> Self {
        Self {
            config,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn execute(&mut self, input: &Path) -> Result<RunReport, PipelineError> {
        let model_path = model_locator::locate(self.config.model_dir.as_deref())?;
        let class_names = load_class_names(self.config.labels.as_deref(), &model_path)?;
        let settings = DetectorSettings {
            confidence: self.config.confidence,
            iou_threshold: self.config.iou_threshold,
            max_detections: MAX_DETECTIONS,
        };
        let (device, detector) = load_on_best_device(
            self.config.device,
            execution_provider::is_available,
            |device| OnnxYoloDetector::load(&model_path, device, settings, class_names.clone()),
        )?;
        log::info!("Using device: {device}");

        let annotator = BoxLabelAnnotator::new(detector.class_names());

        let logger = self
            .logger
            .take()
            .unwrap_or_else(|| Box::new(StdoutPipelineLogger::default()));

        PipelineDriver::new(
            Box::new(FfmpegReader::new()),
            Box::new(FfmpegWriter::new()),
            Box::new(detector),
            Box::new(annotator),
            logger,
        )
        .run(input, &self.config.output_path())
    }
}

/// Annotates `input` with the default configuration and returns the path of
/// `annotated_output.mp4` in the working directory.
pub fn process_video(input: &Path) -> Result<PathBuf, PipelineError> {
    ProcessVideoUseCase::new(ProcessVideoConfig::default())
        .execute(input)
        .map(|report| report.output_path)
}

/// Class names from an explicit labels file, else the model's sidecar file.
///
/// An explicit file that can't be read is an error. A broken sidecar only warns.
fn load_class_names(labels: Option<&Path>, model_path: &Path) -> Result<ClassNames, PipelineError> {
    if let Some(path) = labels {
        return ClassNames::load(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    let sidecar = model_locator::sidecar_labels_path(model_path);
    if !sidecar.is_file() {
        return Ok(ClassNames::default());
    }
    match ClassNames::load(&sidecar) {
        Ok(names) => Ok(names),
        Err(e) => {
            log::warn!("Ignoring unreadable labels {}: {e}", sidecar.display());
            Ok(ClassNames::default())
        }
    }
}
