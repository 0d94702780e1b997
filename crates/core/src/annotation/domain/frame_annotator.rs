use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for drawing detections onto a frame.
///
/// Implementations mutate the frame in place and never fail: coordinates
/// outside the frame are clamped, and an empty detection list leaves the
/// pixels untouched. Output must depend only on the frame and detections.
pub trait FrameAnnotator: Send {
    fn annotate<'f>(&self, frame: &'f mut Frame, detections: &[Detection]) -> &'f mut Frame;
}
