//! YOLO object detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, output decoding and
//! class-aware NMS. Expects an Ultralytics-style export (YOLOv8 and later)
//! whose single output holds `4 + num_classes` values per candidate.

use std::path::Path;

use image::imageops::FilterType;
use image::{ImageBuffer, Rgb};

use crate::detection::domain::class_names::ClassNames;
use crate::detection::domain::device::Device;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::constants::{DEFAULT_CONFIDENCE, DEFAULT_IOU_THRESHOLD, MAX_DETECTIONS};
use crate::shared::detection::{BoundingBox, Detection};
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

use super::execution_provider::execution_providers;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray used for letterbox padding (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Post-processing thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub confidence: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: MAX_DETECTIONS,
        }
    }
}

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    input_size: u32,
    settings: DetectorSettings,
    class_names: ClassNames,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model onto `device`.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn load(
        model_path: &Path,
        device: Device,
        settings: DetectorSettings,
        class_names: ClassNames,
    ) -> Result<Self, PipelineError> {
        if !model_path.is_file() {
            return Err(PipelineError::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }

        let session = ort::session::Session::builder()
            .map_err(|e| invalid_model(model_path, e))?
            .with_execution_providers(execution_providers(device))
            .map_err(|e| PipelineError::DeviceUnavailable {
                device: device.to_string(),
                reason: e.to_string(),
            })?
            .commit_from_file(model_path)
            .map_err(|e| invalid_model(model_path, e))?;

        // Try to read input size from model metadata (NCHW: [1, 3, H, W])
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded {} on {device} (input {input_size}x{input_size}, {} class names)",
            model_path.display(),
            class_names.len()
        );

        Ok(Self {
            session,
            input_size,
            settings,
            class_names,
        })
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
        let frame_index = frame.index();
        let failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            PipelineError::InferenceFailure {
                frame_index,
                source,
            }
        };

        let (input_tensor, mapping) = letterbox(frame, self.input_size)
            .ok_or_else(|| failed("frame is not a packed 3-channel RGB image".into()))?;

        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| failed(e.to_string().into()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| failed(e.to_string().into()))?;
        if outputs.len() == 0 {
            return Err(failed("YOLO model produced no outputs".into()));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| failed(e.to_string().into()))?;
        let data = tensor
            .as_slice()
            .ok_or_else(|| failed("cannot get tensor slice".into()))?;

        let candidates = decode_predictions(data, tensor.shape(), self.settings.confidence)
            .map_err(|msg| failed(msg.into()))?;

        let mapped: Vec<Detection> = candidates
            .into_iter()
            .map(|d| Detection {
                bbox: mapping
                    .to_frame(&d.bbox)
                    .clip(frame.width(), frame.height()),
                ..d
            })
            .collect();

        let mut kept = nms(mapped, self.settings.iou_threshold);
        kept.truncate(self.settings.max_detections);
        Ok(kept)
    }

    fn class_names(&self) -> ClassNames {
        self.class_names.clone()
    }
}

fn invalid_model(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::InvalidModel {
        path: path.to_path_buf(),
        source: e.to_string().into(),
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping between frame pixels and the letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, b: &BoundingBox) -> BoundingBox {
        let px = self.pad_x as f32;
        let py = self.pad_y as f32;
        BoundingBox::new(
            (b.x1 - px) / self.scale,
            (b.y1 - py) / self.scale,
            (b.x2 - px) / self.scale,
            (b.y2 - py) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size`.
///
/// Returns the NCHW float32 tensor and the mapping back to frame space.
fn letterbox(frame: &Frame, target_size: u32) -> Option<(ndarray::Array4<f32>, Letterbox)> {
    let fw = frame.width();
    let fh = frame.height();
    if frame.channels() != 3 || fw == 0 || fh == 0 {
        return None;
    }

    let target = target_size as f32;
    let scale = (target / fw as f32).min(target / fh as f32);
    let new_w = ((fw as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((fh as f32 * scale).round() as u32).clamp(1, target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let src: ImageBuffer<Rgb<u8>, &[u8]> = ImageBuffer::from_raw(fw, fh, frame.data())?;
    let resized = image::imageops::resize(&src, new_w, new_h, FilterType::Triangle);

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );
    for (x, y, pixel) in resized.enumerate_pixels() {
        let ty = (pad_y + y) as usize;
        let tx = (pad_x + x) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
        }
    }

    Some((
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    ))
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes a raw YOLO output tensor into candidates above `confidence`.
///
/// Accepts `[1, 4 + nc, N]` (Ultralytics default, features first) or
/// `[1, N, 4 + nc]`. Boxes stay in letterbox space.
fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f32,
) -> Result<Vec<Detection>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }
    // Candidates vastly outnumber features, so the smaller axis is features.
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Err(format!(
            "YOLO output has {num_feats} values per candidate, expected at least 5"
        ));
    }
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        ));
    }

    let value = |det: usize, feat: usize| -> f32 {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut detections = Vec::new();
    for i in 0..num_dets {
        let (class_id, score) = (4..num_feats)
            .map(|f| (f - 4, value(i, f)))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if !(score >= confidence) {
            continue;
        }
        let bbox = BoundingBox::from_center(value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        detections.push(Detection::new(bbox, class_id, score.min(1.0)));
    }
    Ok(detections)
}

/// Class-aware greedy NMS: sort by confidence descending, suppress
/// same-class boxes that overlap a kept box by more than `iou_thresh`.
///
/// The sort is stable so equal scores keep their decode order.
fn nms(mut dets: Vec<Detection>, iou_thresh: f32) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if suppressed[j] || dets[j].class_id != dets[i].class_id {
                continue;
            }
            if dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
