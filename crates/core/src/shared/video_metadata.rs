use std::fmt;

/// Fallback rate for streams that report no usable frame rate.
const FALLBACK_FPS: i32 = 30;

/// Exact frame rate as a rational `num / den` frames per second.
///
/// Kept rational so NTSC-style rates (30000/1001) survive the trip from
/// source to sink without rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRate {
    pub num: i32,
    pub den: i32,
}

impl FrameRate {
    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Returns the rate, or 30/1 when it is zero, negative or undefined.
    pub fn or_fallback(self) -> Self {
        if self.is_valid() {
            self
        } else {
            Self::new(FALLBACK_FPS, 1)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Stream properties read once from the source and used to configure the sink.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Container-reported frame count; 0 when unknown. Informational only.
    pub total_frames: usize,
    pub codec: String,
}

impl StreamMetadata {
    pub fn fps(&self) -> f64 {
        self.frame_rate.as_f64()
    }
}
