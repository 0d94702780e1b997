use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::StreamMetadata;

/// Abstracts video encoding so the pipeline can write output without
/// depending on a specific codec library.
pub trait VideoWriter: Send {
    /// Creates the output container with the geometry and frame rate of `metadata`.
    fn open(&mut self, path: &Path, metadata: &StreamMetadata) -> Result<(), PipelineError>;

    /// Appends one frame. Rejects frames whose size differs from the
    /// configured geometry with `GeometryMismatch`.
    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError>;

    /// Flushes the encoder and finalizes the container. A second call is a no-op.
    fn close(&mut self) -> Result<(), PipelineError>;
}
