use image::{ImageBuffer, Rgb};

/// A single decoded video frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens at the ffmpeg boundary only; detection
/// and annotation always see packed RGB24.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Zero-based position of this frame in decode order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Borrows the pixels as an `image` buffer for drawing.
    ///
    /// Returns `None` for frames that are not 3-channel.
    pub fn as_rgb_image_mut(&mut self) -> Option<ImageBuffer<Rgb<u8>, &mut [u8]>> {
        if self.channels != 3 {
            return None;
        }
        ImageBuffer::from_raw(self.width, self.height, self.data.as_mut_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_data_mut_allows_modification() {
        let mut frame = Frame::new(vec![0u8; 6], 2, 1, 3, 0);
        frame.data_mut()[0] = 255;
        assert_eq!(frame.data()[0], 255);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_rgb_image_writes_through_to_frame() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        {
            let mut img = frame.as_rgb_image_mut().unwrap();
            img.put_pixel(1, 1, Rgb([10, 20, 30]));
        }
        assert_eq!(&frame.data()[9..12], &[10, 20, 30]);
    }

    #[test]
    fn test_rgb_image_rejects_non_rgb_frames() {
        let mut frame = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(frame.as_rgb_image_mut().is_none());
    }
}
