use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::Packet;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::{FrameRate, StreamMetadata};
use crate::video::domain::video_reader::VideoReader;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegReader {
    state: Option<DecodeState>,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<StreamMetadata, PipelineError> {
        let unavailable = |source: ffmpeg_next::Error| PipelineError::SourceUnavailable {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        ffmpeg_next::init().map_err(unavailable)?;
        let ictx = ffmpeg_next::format::input(path).map_err(unavailable)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PipelineError::SourceUnavailable {
                path: path.to_path_buf(),
                source: "no video stream found".into(),
            })?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(unavailable)?;
        let decoder = codec_ctx.decoder().video().map_err(unavailable)?;

        let rate = stream.avg_frame_rate();
        let rate = if rate.numerator() > 0 && rate.denominator() > 0 {
            rate
        } else {
            stream.rate()
        };

        let metadata = StreamMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frame_rate: FrameRate::new(rate.numerator(), rate.denominator()),
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };
        drop(stream);

        if metadata.width == 0 || metadata.height == 0 {
            return Err(PipelineError::SourceUnavailable {
                path: path.to_path_buf(),
                source: "video stream reports zero dimensions".into(),
            });
        }

        log::debug!(
            "Opened {}: {}x{} @ {} fps ({})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.codec
        );

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler: None,
            stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        });

        Ok(metadata)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        match self.state.as_mut() {
            Some(state) => state.next_frame(),
            None => Err(PipelineError::DecodeFailure {
                frame_index: 0,
                source: "FfmpegReader: not opened".into(),
            }),
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!("FfmpegReader closed");
        }
    }
}

/// Decoder state for one open source, advanced one frame at a time.
struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<Scaler>,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

/// RGB conversion context, rebuilt if the decoded format or size changes.
struct Scaler {
    context: scaling::Context,
    format: Pixel,
    width: u32,
    height: u32,
}

impl DecodeState {
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.done {
            return Ok(None);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }

        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let mut packet = Packet::empty();
            let read = packet.read(&mut self.ictx);
            if !packet_ready(read).map_err(|e| self.decode_error(e))? {
                self.decoder.send_eof().map_err(|e| self.decode_error(e))?;
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            }

            if packet.stream() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .map_err(|e| self.decode_error(e))?;

            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    /// Pulls one decoded frame if the decoder has one ready.
    fn try_receive(&mut self) -> Result<Option<Frame>, PipelineError> {
        let mut decoded = VideoFrame::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                return Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(None),
            Err(e) => return Err(self.decode_error(e)),
        }

        let frame_index = self.frame_index;
        let mut rgb_frame = VideoFrame::empty();
        let scaler = self.scaler_for(&decoded)?;
        scaler
            .context
            .run(&decoded, &mut rgb_frame)
            .map_err(|source| PipelineError::DecodeFailure {
                frame_index,
                source: Box::new(source),
            })?;

        let (width, height) = (decoded.width(), decoded.height());
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn scaler_for(&mut self, decoded: &VideoFrame) -> Result<&mut Scaler, PipelineError> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = !matches!(
            &self.scaler,
            Some(s) if s.format == format && s.width == width && s.height == height
        );
        if stale {
            let context = scaling::Context::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| self.decode_error(e))?;
            self.scaler = Some(Scaler {
                context,
                format,
                width,
                height,
            });
        }
        self.scaler.as_mut().ok_or_else(|| PipelineError::DecodeFailure {
            frame_index: self.frame_index,
            source: "scaler unavailable".into(),
        })
    }

    fn decode_error(&self, source: ffmpeg_next::Error) -> PipelineError {
        PipelineError::DecodeFailure {
            frame_index: self.frame_index,
            source: Box::new(source),
        }
    }
}

/// Interprets one `av_read_frame` result: `Ok(true)` for a packet, `Ok(false)`
/// at end of file. Any other demuxer error is fatal; skipping it would drop
/// frames from the output.
fn packet_ready(read: Result<(), ffmpeg_next::Error>) -> Result<bool, ffmpeg_next::Error> {
    match read {
        Ok(()) => Ok(true),
        Err(ffmpeg_next::Error::Eof) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_rgb_pixels(rgb_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
