use crate::shared::frame::Frame;

use super::detection::Detection;

pub type PerceptionError = Box<dyn std::error::Error + Send + Sync>;

/// Domain interface for face detection.
///
/// Implementations may hold model sessions or scratch buffers, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError>;

    /// Runs throwaway inferences so the first real frame is not slowed down
    /// by lazy model initialization.
    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        Ok(())
    }
}
