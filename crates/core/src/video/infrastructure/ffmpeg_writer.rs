use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::Rational;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::StreamMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Largest time base denominator the MPEG-4 Part 2 encoder accepts.
const MPEG4_MAX_TIMEBASE_DEN: i32 = 65535;

/// Target bits per pixel per frame for the MPEG-4 encoder.
const BITS_PER_PIXEL: f64 = 0.15;

/// Encodes frames into an MPEG-4 Part 2 video via ffmpeg-next.
///
/// The container format is guessed from the output extension; geometry and
/// frame rate are copied exactly from the source metadata.
pub struct FfmpegWriter {
    state: Option<EncodeState>,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

struct EncodeState {
    path: PathBuf,
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    time_base: Rational,
    frames_written: usize,
}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Number of frames appended since `open`, or 0 when closed.
    pub fn frames_written(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.frames_written)
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(&mut self, path: &Path, metadata: &StreamMetadata) -> Result<(), PipelineError> {
        let unwritable = |source: ffmpeg_next::Error| PipelineError::SinkUnwritable {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        ffmpeg_next::init().map_err(unwritable)?;

        let mut octx = ffmpeg_next::format::output(path).map_err(unwritable)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).ok_or_else(|| {
            PipelineError::SinkUnwritable {
                path: path.to_path_buf(),
                source: "MPEG4 encoder not found".into(),
            }
        })?;

        let mut ost = octx.add_stream(Some(codec)).map_err(unwritable)?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(unwritable)?;

        let rate = encoder_rate(metadata);
        let time_base = Rational(rate.denominator(), rate.numerator());

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(rate));
        encoder_ctx.set_bit_rate(target_bit_rate(metadata.width, metadata.height, rate));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(unwritable)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        ost.set_avg_frame_rate(rate);

        octx.write_header().map_err(unwritable)?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            metadata.width,
            metadata.height,
            scaling::Flags::BILINEAR,
        )
        .map_err(unwritable)?;

        log::debug!(
            "Opened sink {}: {}x{} @ {} fps",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frame_rate
        );

        self.state = Some(EncodeState {
            path: path.to_path_buf(),
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            time_base,
            frames_written: 0,
        });

        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        let state = self.state.as_mut().ok_or_else(|| PipelineError::EncodeFailure {
            frame_index: frame.index(),
            source: "FfmpegWriter: not opened".into(),
        })?;
        state.write(frame)
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.finish()?;
        log::debug!(
            "Closed sink {} after {} frames",
            state.path.display(),
            state.frames_written
        );
        Ok(())
    }
}

impl EncodeState {
    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(PipelineError::GeometryMismatch {
                frame_index: frame.index(),
                expected_width: self.width,
                expected_height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        if frame.channels() != 3 {
            return Err(PipelineError::EncodeFailure {
                frame_index: frame.index(),
                source: format!("expected 3 channels, got {}", frame.channels()).into(),
            });
        }

        let mut rgb_frame = VideoFrame::new(Pixel::RGB24, self.width, self.height);

        let stride = rgb_frame.stride(0);
        let row_bytes = self.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        let src = frame.data();

        // Copy pixel data, respecting stride
        for row in 0..self.height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        let index = frame.index();
        let mut yuv_frame = VideoFrame::empty();
        self.scaler
            .run(&rgb_frame, &mut yuv_frame)
            .map_err(|e| encode_error(index, e))?;
        yuv_frame.set_pts(Some(self.frames_written as i64));

        self.encoder
            .send_frame(&yuv_frame)
            .map_err(|e| encode_error(index, e))?;
        self.drain_packets(index)?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        let index = self.frames_written;
        self.encoder
            .send_eof()
            .map_err(|e| encode_error(index, e))?;
        self.drain_packets(index)?;
        self.octx
            .write_trailer()
            .map_err(|e| encode_error(index, e))
    }

    fn drain_packets(&mut self, index: usize) -> Result<(), PipelineError> {
        let ost_time_base = self
            .octx
            .stream(0)
            .map(|s| s.time_base())
            .ok_or_else(|| PipelineError::EncodeFailure {
                frame_index: index,
                source: "output stream missing".into(),
            })?;

        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded
                .write_interleaved(&mut self.octx)
                .map_err(|e| encode_error(index, e))?;
        }
        Ok(())
    }
}

fn encode_error(frame_index: usize, source: ffmpeg_next::Error) -> PipelineError {
    PipelineError::EncodeFailure {
        frame_index,
        source: Box::new(source),
    }
}

/// Frame rate handed to the encoder: the source rate when MPEG-4 can
/// represent it, otherwise the nearest whole rate.
fn encoder_rate(metadata: &StreamMetadata) -> Rational {
    let rate = metadata.frame_rate.or_fallback();
    if rate.num <= MPEG4_MAX_TIMEBASE_DEN {
        return Rational(rate.num, rate.den);
    }
    let rounded = (rate.as_f64().round() as i32).clamp(1, MPEG4_MAX_TIMEBASE_DEN);
    log::warn!(
        "Frame rate {rate} exceeds the MPEG-4 time base range, encoding at {rounded} fps"
    );
    Rational(rounded, 1)
}

fn target_bit_rate(width: u32, height: u32, rate: Rational) -> usize {
    let fps = rate.numerator() as f64 / rate.denominator().max(1) as f64;
    (width as f64 * height as f64 * fps * BITS_PER_PIXEL) as usize
}
