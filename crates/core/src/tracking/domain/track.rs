use std::time::Instant;

use crate::shared::region::Region;

/// Identifier of a tracked face. Allocated monotonically and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// Matched or successfully predicted on the last frame.
    Active,
    /// Missed at least one frame but still under the loss limit.
    Lost,
}

/// One physically tracked face.
///
/// Everything the pipeline remembers about a face lives here, so removing the
/// track from its manager also forgets its embedding schedule and motion.
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    region: Region,
    lost_frames: u32,
    state: TrackState,
    /// Per-frame box displacement observed at the last two associations.
    velocity: (f64, f64),
    coasted_frames: u32,
    unmatched_frames: u32,
    last_embedding_at: Option<Instant>,
}

impl Track {
    pub fn new(id: TrackId, region: Region) -> Self {
        Self {
            id,
            region,
            lost_frames: 0,
            state: TrackState::Active,
            velocity: (0.0, 0.0),
            coasted_frames: 0,
            unmatched_frames: 0,
            last_embedding_at: None,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn lost_frames(&self) -> u32 {
        self.lost_frames
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    /// Frames predicted in a row since the last real association.
    pub fn coasted_frames(&self) -> u32 {
        self.coasted_frames
    }

    pub fn last_embedding_at(&self) -> Option<Instant> {
        self.last_embedding_at
    }

    /// Reinitializes the track at a detected box. The displacement since the
    /// previous association, spread over the frames in between, becomes the
    /// new velocity.
    pub fn associate(&mut self, region: Region) {
        let steps = (self.unmatched_frames + 1) as f64;
        let center = center(&region);
        let previous = center_of_prediction_origin(&self.region, self.velocity, self.coasted_frames);
        self.velocity = ((center.0 - previous.0) / steps, (center.1 - previous.1) / steps);
        self.region = region;
        self.lost_frames = 0;
        self.coasted_frames = 0;
        self.unmatched_frames = 0;
        self.state = TrackState::Active;
    }

    /// Moves the track to a self-predicted box. Counts as a kept frame.
    pub fn coast(&mut self, region: Region) {
        self.region = region;
        self.coasted_frames += 1;
        self.unmatched_frames += 1;
        self.lost_frames = 0;
        self.state = TrackState::Active;
    }

    /// Records a frame with neither a matching detection nor a usable
    /// prediction. Returns the new consecutive loss count.
    pub fn mark_lost(&mut self) -> u32 {
        self.lost_frames += 1;
        self.unmatched_frames += 1;
        self.state = TrackState::Lost;
        self.lost_frames
    }

    pub fn record_embedding_request(&mut self, at: Instant) {
        self.last_embedding_at = Some(at);
    }
}

fn center(region: &Region) -> (f64, f64) {
    (
        region.x as f64 + region.width as f64 / 2.0,
        region.y as f64 + region.height as f64 / 2.0,
    )
}

/// Center of the box at the last real association, undoing any coasting.
fn center_of_prediction_origin(region: &Region, velocity: (f64, f64), coasted: u32) -> (f64, f64) {
    let (cx, cy) = center(region);
    let n = coasted as f64;
    (cx - velocity.0 * n, cy - velocity.1 * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId::new(12).to_string(), "t12");
    }

    #[test]
    fn test_new_track_is_active_without_history() {
        let track = Track::new(TrackId::new(1), Region::new(0, 0, 10, 10));
        assert_eq!(track.state(), TrackState::Active);
        assert_eq!(track.lost_frames(), 0);
        assert!(track.last_embedding_at().is_none());
        assert_eq!(track.velocity(), (0.0, 0.0));
    }

    #[test]
    fn test_associate_resets_loss_and_measures_velocity() {
        let mut track = Track::new(TrackId::new(1), Region::new(10, 10, 50, 50));
        track.mark_lost();
        track.associate(Region::new(16, 12, 50, 50));

        assert_eq!(track.lost_frames(), 0);
        assert_eq!(track.state(), TrackState::Active);
        assert_eq!(track.region(), Region::new(16, 12, 50, 50));
        assert_relative_eq!(track.velocity().0, 3.0);
        assert_relative_eq!(track.velocity().1, 1.0);
    }

    #[test]
    fn test_velocity_after_coasting_uses_last_association() {
        let mut track = Track::new(TrackId::new(1), Region::new(0, 0, 10, 10));
        track.associate(Region::new(2, 0, 10, 10));
        track.coast(Region::new(4, 0, 10, 10));
        track.coast(Region::new(6, 0, 10, 10));
        track.associate(Region::new(8, 0, 10, 10));

        assert_relative_eq!(track.velocity().0, 2.0);
        assert_eq!(track.coasted_frames(), 0);
    }

    #[test]
    fn test_mark_lost_counts_consecutive_frames() {
        let mut track = Track::new(TrackId::new(1), Region::new(0, 0, 10, 10));
        assert_eq!(track.mark_lost(), 1);
        assert_eq!(track.mark_lost(), 2);
        assert_eq!(track.state(), TrackState::Lost);
    }
}
