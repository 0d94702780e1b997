use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::constants::STAGING_SUFFIX;
use crate::shared::error::PipelineError;
use crate::shared::video_metadata::StreamMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_logger::PipelineLogger;

/// Lifecycle of one driver run. `Closed` is reached on every path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SourceOpen,
    Looping,
    Draining,
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::SourceOpen => "source-open",
            PipelineState::Looping => "looping",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub output_path: PathBuf,
    pub frames_written: usize,
    /// Number of detections drawn on each frame, in frame order.
    pub detections_per_frame: Vec<usize>,
}

/// Step data carried between states.
enum Step {
    Idle,
    SourceOpen(StreamMetadata),
    /// Carries the container's frame-count estimate, if any.
    Looping(Option<usize>),
    Draining(Option<PipelineError>),
    Closed(Result<(), PipelineError>),
}

impl Step {
    fn state(&self) -> PipelineState {
        match self {
            Step::Idle => PipelineState::Idle,
            Step::SourceOpen(_) => PipelineState::SourceOpen,
            Step::Looping(_) => PipelineState::Looping,
            Step::Draining(_) => PipelineState::Draining,
            Step::Closed(_) => PipelineState::Closed,
        }
    }
}

/// Runs read -> detect -> annotate -> write over one video.
///
/// Frames are written to a staging file beside the output and renamed into
/// place only after the sink closes cleanly. Source and sink are each
/// released exactly once, on success and on every failure path.
///
/// Single-use: `run` consumes the driver.
pub struct PipelineDriver {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    detector: Box<dyn ObjectDetector>,
    annotator: Box<dyn FrameAnnotator>,
    logger: Box<dyn PipelineLogger>,
    on_transition: Option<Box<dyn FnMut(PipelineState) + Send>>,
}

impl PipelineDriver {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn ObjectDetector>,
        annotator: Box<dyn FrameAnnotator>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            writer,
            detector,
            annotator,
            logger,
            on_transition: None,
        }
    }

    /// Registers a callback invoked with each state the driver enters.
    pub fn with_transition_observer(
        mut self,
        observer: impl FnMut(PipelineState) + Send + 'static,
    ) -> Self {
        self.on_transition = Some(Box::new(observer));
        self
    }

    pub fn run(mut self, input: &Path, output: &Path) -> Result<RunReport, PipelineError> {
        let staging = staging_path(output);
        let mut detections_per_frame = Vec::new();
        let mut step = Step::Idle;
        self.enter(&step);

        let outcome = loop {
            step = match step {
                Step::Idle => match self.reader.open(input) {
                    Ok(metadata) => {
                        self.logger.info(&format!(
                            "Opened {} ({}x{} @ {} fps, {} frames, {})",
                            input.display(),
                            metadata.width,
                            metadata.height,
                            metadata.frame_rate,
                            metadata.total_frames,
                            metadata.codec
                        ));
                        Step::SourceOpen(metadata)
                    }
                    Err(e) => Step::Closed(Err(e)),
                },
                Step::SourceOpen(metadata) => {
                    let total = (metadata.total_frames > 0).then_some(metadata.total_frames);
                    match self.writer.open(&staging, &metadata) {
                        Ok(()) => Step::Looping(total),
                        Err(e) => {
                            self.reader.close();
                            remove_staging(&staging);
                            Step::Closed(Err(e))
                        }
                    }
                }
                Step::Looping(total) => {
                    Step::Draining(self.pump(total, &mut detections_per_frame).err())
                }
                Step::Draining(failure) => {
                    let closed = self.writer.close();
                    self.reader.close();
                    if let (Some(_), Err(close_err)) = (&failure, &closed) {
                        let message = format!("Ignoring sink close error after failure: {close_err}");
                        self.logger.warn(&message);
                    }
                    let result = match (failure, closed) {
                        (Some(e), _) => Err(e),
                        (None, Err(e)) => Err(e),
                        (None, Ok(())) => publish(&staging, output),
                    };
                    if result.is_err() {
                        remove_staging(&staging);
                    }
                    Step::Closed(result)
                }
                Step::Closed(result) => break result,
            };
            self.enter(&step);
        };

        match outcome {
            Ok(()) => {
                self.logger.info(&format!(
                    "Wrote {} frames to {}",
                    detections_per_frame.len(),
                    output.display()
                ));
                self.logger.summary();
                Ok(RunReport {
                    output_path: output.to_path_buf(),
                    frames_written: detections_per_frame.len(),
                    detections_per_frame,
                })
            }
            Err(e) => {
                log::debug!("Run failed after {} frames: {e}", detections_per_frame.len());
                Err(e)
            }
        }
    }

    fn enter(&mut self, step: &Step) {
        let state = step.state();
        log::debug!("Pipeline -> {state}");
        if let Some(observer) = self.on_transition.as_mut() {
            observer(state);
        }
    }

    /// Pulls frames until end of stream. Any error ends the loop.
    fn pump(
        &mut self,
        total: Option<usize>,
        detections_per_frame: &mut Vec<usize>,
    ) -> Result<(), PipelineError> {
        loop {
            let t0 = Instant::now();
            let Some(mut frame) = self.reader.next_frame()? else {
                return Ok(());
            };
            let t1 = Instant::now();
            let detections = self.detector.infer(&frame)?;
            let t2 = Instant::now();
            self.annotator.annotate(&mut frame, &detections);
            let t3 = Instant::now();
            self.writer.write(&frame)?;
            let t4 = Instant::now();

            detections_per_frame.push(detections.len());
            self.logger.timing("decode", ms(t1 - t0));
            self.logger.timing("detect", ms(t2 - t1));
            self.logger.timing("annotate", ms(t3 - t2));
            self.logger.timing("write", ms(t4 - t3));
            self.logger.metric("detections", detections.len() as f64);
            self.logger.progress(detections_per_frame.len(), total);
        }
    }
}

fn ms(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// `out/annotated_output.mp4` -> `out/annotated_output.partial.mp4`.
pub fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.{STAGING_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{STAGING_SUFFIX}"),
    };
    output.with_file_name(name)
}

fn publish(staging: &Path, output: &Path) -> Result<(), PipelineError> {
    fs::rename(staging, output).map_err(|source| PipelineError::Io {
        path: output.to_path_buf(),
        source,
    })
}

fn remove_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => log::debug!("Removed partial output {}", staging.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial output {}: {e}", staging.display()),
    }
}
