//! ArcFace embedder on ONNX Runtime.
use std::path::Path;

use crate::perception::domain::embedding::Embedding;
use crate::perception::domain::face_detector::PerceptionError;
use crate::perception::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::onnx_session::{open_session, to_perception_error};

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Crops a face with a margin, resizes to 112×112 and returns the unit-length
/// ArcFace descriptor.
pub struct OnnxFaceEmbedder {
    session: ort::session::Session,
    margin: i32,
}

impl OnnxFaceEmbedder {
    pub fn new(model_path: &Path, margin: i32, intra_threads: usize) -> Result<Self, PerceptionError> {
        let session = open_session(model_path, intra_threads)?;
        Ok(Self { session, margin })
    }

    fn run(&mut self, crop: &Frame) -> Result<Embedding, PerceptionError> {
        let tensor = preprocess(crop);
        let input_value = ort::value::Tensor::from_array(tensor).map_err(to_perception_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(to_perception_error)?;
        let embedding_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(to_perception_error)?;
        let values = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?
            .to_vec();
        Ok(Embedding::normalized(values))
    }
}

impl FaceEmbedder for OnnxFaceEmbedder {
    fn embed(&mut self, frame: &Frame, region: &Region) -> Result<Embedding, PerceptionError> {
        let padded = region.expanded_within(self.margin, frame.width(), frame.height());
        let crop = frame
            .crop(&padded)
            .ok_or_else(|| format!("Face region {region} lies outside the frame"))?;
        self.run(&crop)
    }

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        let crop = Frame::noise(INPUT_SIZE as u32, INPUT_SIZE as u32, 11);
        self.run(&crop).map(|_| ())
    }
}

/// Nearest-neighbour resize to 112×112, `(v - 127.5) / 127.5`, NCHW.
fn preprocess(crop: &Frame) -> ndarray::Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let src = crop.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}
