use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::embedding::Embedding;
use super::face_detector::PerceptionError;

/// Domain interface for computing an identity embedding of one face.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, frame: &Frame, region: &Region) -> Result<Embedding, PerceptionError>;

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        Ok(())
    }
}
