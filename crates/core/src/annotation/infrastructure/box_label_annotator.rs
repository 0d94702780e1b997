use image::{ImageBuffer, Rgb};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::palette::{text_color_for, Palette};
use crate::detection::domain::class_names::ClassNames;
use crate::shared::detection::{Detection, PixelRect};
use crate::shared::frame::Frame;

use super::glyphs::{draw_text, text_size};

const MIN_LINE_WIDTH: u32 = 2;

/// Draws a class-colored rectangle per detection with a
/// `"{name} {confidence:.2}"` label on a filled tab.
///
/// The tab sits above the box when there is room, otherwise just inside
/// its top edge. Line width and text size grow with frame resolution.
pub struct BoxLabelAnnotator {
    class_names: ClassNames,
    palette: Palette,
}

impl BoxLabelAnnotator {
    pub fn new(class_names: ClassNames) -> Self {
        Self {
            class_names,
            palette: Palette::default(),
        }
    }

    pub fn label_for(&self, detection: &Detection) -> String {
        format!(
            "{} {:.2}",
            self.class_names.name(detection.class_id),
            detection.confidence
        )
    }
}

impl FrameAnnotator for BoxLabelAnnotator {
    fn annotate<'f>(&self, frame: &'f mut Frame, detections: &[Detection]) -> &'f mut Frame {
        if detections.is_empty() {
            return frame;
        }
        let (width, height) = (frame.width(), frame.height());
        let line_width = line_width(width, height);
        let text_scale = (line_width / 2).max(1);

        if let Some(mut image) = frame.as_rgb_image_mut() {
            for detection in detections {
                let Some(rect) = detection.bbox.clamp_to(width, height) else {
                    continue;
                };
                let color = self.palette.color(detection.class_id);
                draw_box(&mut image, rect, line_width, color);
                draw_label(
                    &mut image,
                    rect,
                    &self.label_for(detection),
                    text_scale,
                    color,
                );
            }
        }
        frame
    }
}

/// Stroke width in pixels for a `width` x `height` frame.
pub fn line_width(width: u32, height: u32) -> u32 {
    let scaled = ((width as f64 + height as f64) / 2.0 * 0.003).round() as u32;
    scaled.max(MIN_LINE_WIDTH)
}

type RgbView<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

/// Strokes `rect` inward so the outline never leaves the frame.
fn draw_box(image: &mut RgbView<'_>, rect: PixelRect, line_width: u32, color: Rgb<u8>) {
    let t = line_width.saturating_sub(1);
    let inner_top = (rect.top + t).min(rect.bottom);
    let inner_bottom = rect.bottom.saturating_sub(t).max(rect.top);
    let inner_left = (rect.left + t).min(rect.right);
    let inner_right = rect.right.saturating_sub(t).max(rect.left);

    fill_rect(image, rect.left, rect.top, rect.right, inner_top, color);
    fill_rect(image, rect.left, inner_bottom, rect.right, rect.bottom, color);
    fill_rect(image, rect.left, rect.top, inner_left, rect.bottom, color);
    fill_rect(image, inner_right, rect.top, rect.right, rect.bottom, color);
}

fn draw_label(image: &mut RgbView<'_>, rect: PixelRect, text: &str, scale: u32, color: Rgb<u8>) {
    let (img_w, img_h) = (image.width(), image.height());
    let (text_w, text_h) = text_size(text, scale);
    let pad = scale;
    let tab_w = text_w + 2 * pad;
    let tab_h = text_h + 2 * pad;

    let top = if rect.top >= tab_h {
        rect.top - tab_h
    } else {
        rect.top
    };
    let left = rect.left.min(img_w.saturating_sub(tab_w));
    let right = (left + tab_w).min(img_w) - 1;
    let bottom = (top + tab_h).min(img_h) - 1;

    fill_rect(image, left, top, right, bottom, color);
    draw_text(
        image,
        (left + pad) as i64,
        (top + pad) as i64,
        text,
        scale,
        text_color_for(color),
    );
}

/// Fills the inclusive rectangle, clamped to the image.
fn fill_rect(image: &mut RgbView<'_>, left: u32, top: u32, right: u32, bottom: u32, color: Rgb<u8>) {
    let max_x = image.width().saturating_sub(1);
    let max_y = image.height().saturating_sub(1);
    for y in top.min(max_y)..=bottom.min(max_y) {
        for x in left.min(max_x)..=right.min(max_x) {
            image.put_pixel(x, y, color);
        }
    }
}
