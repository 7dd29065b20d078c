//! YOLO-face detector running on ONNX Runtime.
//!
//! Letterboxes the frame to the model's square input, runs inference, maps
//! boxes back to frame coordinates and applies greedy NMS.
use std::path::Path;

use crate::perception::domain::detection::Detection;
use crate::perception::domain::face_detector::{FaceDetector, PerceptionError};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::onnx_session::{open_session, to_perception_error};

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Raw confidence floor; stricter filtering happens in the decorator.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

const WARM_UP_RUNS: usize = 3;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    pub fn new(
        model_path: &Path,
        confidence: f64,
        intra_threads: usize,
    ) -> Result<Self, PerceptionError> {
        let session = open_session(model_path, intra_threads)?;

        // NCHW: [1, 3, H, W]
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!("Face detector input size {input_size}");
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(to_perception_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(to_perception_error)?;
        if outputs.len() == 0 {
            return Err("Face detector produced no outputs".into());
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(to_perception_error)?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected detector output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut candidates = parse_rows(data, shape[1], shape[2], self.confidence)
            .into_iter()
            .map(|c| letterbox.unmap(c))
            .collect::<Vec<_>>();
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|c| Detection::new(Region::from_corners(c.x1, c.y1, c.x2, c.y2), c.confidence))
            .filter(|d| !d.region.is_degenerate())
            .collect())
    }

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        let frame = Frame::noise(self.input_size, self.input_size, 7);
        for _ in 0..WARM_UP_RUNS {
            self.detect(&frame)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

/// Geometry of a letterbox resize, used to map boxes back to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn unmap(&self, c: Candidate) -> Candidate {
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        Candidate {
            x1: (c.x1 - px) / self.scale,
            y1: (c.y1 - py) / self.scale,
            x2: (c.x2 - px) / self.scale,
            y2: (c.y2 - py) / self.scale,
            confidence: c.confidence,
        }
    }
}

/// Letterbox-resizes a frame into a `target_size` square NCHW tensor in [0, 1].
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Reads `[cx, cy, w, h, conf, ...]` rows from either output layout:
/// `[1, features, detections]` or `[1, detections, features]`.
fn parse_rows(data: &[f32], dim1: usize, dim2: usize, min_confidence: f64) -> Vec<Candidate> {
    let transposed = dim1 < dim2;
    let (num_dets, num_feats) = if transposed { (dim2, dim1) } else { (dim1, dim2) };
    if num_feats < 5 {
        return Vec::new();
    }

    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data.get(idx).copied().unwrap_or(0.0) as f64
    };

    (0..num_dets)
        .filter_map(|i| {
            let confidence = value(i, 4);
            if confidence < min_confidence {
                return None;
            }
            let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
            Some(Candidate {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
                confidence,
            })
        })
        .collect()
}

/// Greedy NMS: highest confidence first, suppress overlapping boxes.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| corner_iou(k, c) <= iou_thresh) {
            keep.push(*c);
        }
    }
    keep
}

fn corner_iou(a: &Candidate, b: &Candidate) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}
