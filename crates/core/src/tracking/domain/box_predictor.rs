use crate::shared::region::Region;

use super::track::Track;

/// Motion model a track uses on frames without a fresh detection.
pub trait BoxPredictor: Send {
    /// Returns the predicted box, or `None` when the prediction is not
    /// trustworthy and the frame should count as lost.
    fn predict(&self, track: &Track, frame_w: u32, frame_h: u32) -> Option<Region>;
}

/// Constant-velocity extrapolation from the last two associations.
///
/// Gives up after `max_coast_frames` consecutive predictions, or when the
/// box would leave the frame.
pub struct VelocityPredictor {
    max_coast_frames: u32,
}

impl VelocityPredictor {
    pub fn new(max_coast_frames: u32) -> Self {
        Self { max_coast_frames }
    }
}

impl BoxPredictor for VelocityPredictor {
    fn predict(&self, track: &Track, frame_w: u32, frame_h: u32) -> Option<Region> {
        if track.coasted_frames() >= self.max_coast_frames {
            return None;
        }
        let (dx, dy) = track.velocity();
        let predicted = track.region().translated(dx, dy);
        predicted
            .overlaps_frame(frame_w, frame_h)
            .then_some(predicted)
    }
}
