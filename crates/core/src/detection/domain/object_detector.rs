use crate::detection::domain::class_names::ClassNames;
use crate::shared::detection::Detection;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

/// Domain interface for a per-frame object detector.
///
/// The pipeline depends only on this contract, never on a model's internal
/// representation. Implementations must return detections in a stable
/// order for a given frame and must not carry state between frames that
/// changes their output.
pub trait ObjectDetector: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError>;

    /// Human-readable names for the class ids this detector emits.
    fn class_names(&self) -> ClassNames {
        ClassNames::default()
    }
}
