/// Axis-aligned box in frame pixel space, as `(x1, y1)` top-left and
/// `(x2, y2)` bottom-right corners.
///
/// Coordinates are not guaranteed to lie within the frame; consumers
/// clamp with [`BoundingBox::clamp_to`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer pixel rectangle with inclusive corners, guaranteed inside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from YOLO-style center/size coordinates.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clips the box to `[0, width] x [0, height]` in float space.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self::new(
            self.x1.clamp(0.0, w),
            self.y1.clamp(0.0, h),
            self.x2.clamp(0.0, w),
            self.y2.clamp(0.0, h),
        )
    }

    /// Rounds and clamps the box to pixel indices of a `width` x `height` frame.
    ///
    /// Swapped corners are normalized and NaN coordinates collapse to 0.
    /// Returns `None` only for an empty frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;
        let px = |v: f32, max: f32| -> u32 {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, max) as u32
            }
        };
        let (ax, bx) = (px(self.x1, max_x), px(self.x2, max_x));
        let (ay, by) = (px(self.y1, max_y), px(self.y2, max_y));
        Some(PixelRect {
            left: ax.min(bx),
            top: ay.min(by),
            right: ax.max(bx),
            bottom: ay.max(by),
        })
    }
}

/// One detected object in a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    /// Score in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: usize, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_from_center() {
        let b = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b, BoundingBox::new(40.0, 35.0, 60.0, 45.0));
    }

    #[test]
    fn test_iou_identical() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50x100 = 5000, union 15000
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let b = BoundingBox::new(50.0, 0.0, 150.0, 100.0);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_clip_to_frame() {
        let b = BoundingBox::new(-5.0, -10.0, 700.0, 500.0).clip(640, 480);
        assert_eq!(b, BoundingBox::new(0.0, 0.0, 640.0, 480.0));
    }

    #[rstest]
    #[case::inside(BoundingBox::new(10.0, 20.0, 30.0, 40.0), PixelRect { left: 10, top: 20, right: 30, bottom: 40 })]
    #[case::overflowing(BoundingBox::new(-50.0, -50.0, 1000.0, 1000.0), PixelRect { left: 0, top: 0, right: 99, bottom: 49 })]
    #[case::fully_outside(BoundingBox::new(200.0, 200.0, 300.0, 300.0), PixelRect { left: 99, top: 49, right: 99, bottom: 49 })]
    #[case::swapped(BoundingBox::new(30.0, 40.0, 10.0, 20.0), PixelRect { left: 10, top: 20, right: 30, bottom: 40 })]
    #[case::nan(BoundingBox::new(f32::NAN, 5.0, 10.0, f32::NAN), PixelRect { left: 0, top: 0, right: 10, bottom: 5 })]
    fn test_clamp_to(#[case] bbox: BoundingBox, #[case] expected: PixelRect) {
        assert_eq!(bbox.clamp_to(100, 50), Some(expected));
    }

    #[test]
    fn test_clamp_to_empty_frame() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(b.clamp_to(0, 10), None);
    }
}
