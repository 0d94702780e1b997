use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::StreamMetadata;

/// Sequential, forward-only access to the frames of a video file.
///
/// Implementations handle container and codec details while the pipeline
/// works with the abstract `Frame` and `StreamMetadata` types.
pub trait VideoReader: Send {
    /// Opens the source and returns its stream metadata.
    ///
    /// Fails with `SourceUnavailable` when the path is missing or holds
    /// no decodable video stream.
    fn open(&mut self, path: &Path) -> Result<StreamMetadata, PipelineError>;

    /// Decodes the next frame in presentation order.
    ///
    /// `Ok(None)` marks the end of the stream. The sequence cannot be
    /// rewound.
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;

    /// Releases the underlying file handle. Safe to call more than once.
    fn close(&mut self);
}
