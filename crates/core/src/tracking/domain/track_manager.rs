//! Frame-to-frame association of face boxes with persistent tracks.
//!
//! Association is greedy: detections are visited in order and each claims the
//! not-yet-matched track with the highest IoU above the threshold. There is no
//! global assignment step.
use crate::shared::region::Region;

use super::box_predictor::BoxPredictor;
use super::track::{Track, TrackId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackManagerConfig {
    /// A track is removed once its consecutive loss count exceeds this.
    pub max_lost_frames: u32,
    /// Minimum IoU (exclusive) for a detection to claim a track.
    pub iou_threshold: f64,
}

/// Lifecycle changes produced by one frame update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackChanges {
    pub created: Vec<TrackId>,
    pub removed: Vec<TrackId>,
}

pub struct TrackManager {
    config: TrackManagerConfig,
    predictor: Box<dyn BoxPredictor>,
    tracks: Vec<Track>,
    next_id: u64,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig, predictor: Box<dyn BoxPredictor>) -> Self {
        Self {
            config,
            predictor,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Advances every track by one frame.
    ///
    /// `detections` is the authoritative box set when the detector produced
    /// a result for this frame; `None` lets each track self-predict.
    pub fn update(
        &mut self,
        detections: Option<&[Region]>,
        frame_w: u32,
        frame_h: u32,
    ) -> TrackChanges {
        match detections {
            Some(regions) => self.associate(regions),
            None => self.predict(frame_w, frame_h),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn associate(&mut self, regions: &[Region]) -> TrackChanges {
        let mut changes = TrackChanges::default();
        let mut matched = vec![false; self.tracks.len()];

        for region in regions {
            match self.best_unmatched(region, &matched) {
                Some(idx) => {
                    self.tracks[idx].associate(*region);
                    matched[idx] = true;
                }
                None => {
                    let id = self.allocate_id();
                    log::info!("New track {id} at {region}");
                    self.tracks.push(Track::new(id, *region));
                    matched.push(true);
                    changes.created.push(id);
                }
            }
        }

        for (track, _) in self.tracks.iter_mut().zip(&matched).filter(|(_, m)| !**m) {
            track.mark_lost();
        }
        changes.removed = self.remove_expired();
        changes
    }

    fn predict(&mut self, frame_w: u32, frame_h: u32) -> TrackChanges {
        for track in &mut self.tracks {
            match self.predictor.predict(track, frame_w, frame_h) {
                Some(region) if !region.is_degenerate() => track.coast(region),
                _ => {
                    track.mark_lost();
                }
            }
        }
        TrackChanges {
            created: Vec::new(),
            removed: self.remove_expired(),
        }
    }

    /// Highest-IoU unmatched track strictly above the threshold. Earlier
    /// tracks win ties.
    fn best_unmatched(&self, region: &Region, matched: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, track) in self.tracks.iter().enumerate() {
            if matched[idx] {
                continue;
            }
            let iou = track.region().iou(region);
            let floor = best.map_or(self.config.iou_threshold, |(_, b)| b);
            if iou > floor {
                best = Some((idx, iou));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn remove_expired(&mut self) -> Vec<TrackId> {
        let max_lost = self.config.max_lost_frames;
        let mut removed = Vec::new();
        self.tracks.retain(|track| {
            let keep = track.lost_frames() <= max_lost;
            if !keep {
                log::info!("Track {} lost, removed", track.id());
                removed.push(track.id());
            }
            keep
        });
        removed
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::box_predictor::VelocityPredictor;
    use crate::tracking::domain::track::TrackState;
    use std::collections::HashSet;
    use std::time::Instant;

    const W: u32 = 640;
    const H: u32 = 480;

    /// Predictor that never produces a box, so every detection-less frame
    /// counts as lost.
    struct FailingPredictor;

    impl BoxPredictor for FailingPredictor {
        fn predict(&self, _track: &Track, _w: u32, _h: u32) -> Option<Region> {
            None
        }
    }

    fn config(max_lost_frames: u32) -> TrackManagerConfig {
        TrackManagerConfig {
            max_lost_frames,
            iou_threshold: 0.3,
        }
    }

    fn manager(max_lost_frames: u32) -> TrackManager {
        TrackManager::new(config(max_lost_frames), Box::new(FailingPredictor))
    }

    fn r(x: i32, y: i32, w: i32, h: i32) -> Region {
        Region::new(x, y, w, h)
    }

    #[test]
    fn test_overlapping_detection_keeps_track_id() {
        let mut tm = manager(15);
        let first = tm.update(Some(&[r(10, 10, 50, 50)]), W, H);
        assert_eq!(first.created.len(), 1);
        let id = first.created[0];

        tm.update(None, W, H);
        assert_eq!(tm.get(id).unwrap().lost_frames(), 1);

        let second = tm.update(Some(&[r(12, 11, 50, 50)]), W, H);
        assert!(second.created.is_empty());
        let track = tm.get(id).unwrap();
        assert_eq!(track.region(), r(12, 11, 50, 50));
        assert_eq!(track.lost_frames(), 0);
        assert_eq!(tm.len(), 1);
    }

    #[test]
    fn test_low_overlap_spawns_new_track() {
        let mut tm = manager(15);
        tm.update(Some(&[r(0, 0, 50, 50)]), W, H);
        let changes = tm.update(Some(&[r(40, 40, 50, 50)]), W, H);

        assert_eq!(changes.created.len(), 1);
        assert_eq!(tm.len(), 2);
    }

    #[test]
    fn test_track_removed_after_exceeding_loss_limit() {
        let max_lost = 3;
        let mut tm = manager(max_lost);
        let id = tm.update(Some(&[r(10, 10, 50, 50)]), W, H).created[0];
        tm.get_mut(id)
            .unwrap()
            .record_embedding_request(Instant::now());

        for _ in 0..max_lost {
            let changes = tm.update(Some(&[]), W, H);
            assert!(changes.removed.is_empty());
        }
        assert_eq!(tm.get(id).unwrap().state(), TrackState::Lost);

        let changes = tm.update(Some(&[]), W, H);
        assert_eq!(changes.removed, vec![id]);
        assert!(tm.get(id).is_none());
        assert!(tm.is_empty());
    }

    #[test]
    fn test_failed_prediction_counts_as_loss() {
        let mut tm = manager(1);
        let id = tm.update(Some(&[r(10, 10, 50, 50)]), W, H).created[0];
        tm.update(None, W, H);
        assert_eq!(tm.get(id).unwrap().lost_frames(), 1);
        let changes = tm.update(None, W, H);
        assert_eq!(changes.removed, vec![id]);
    }

    #[test]
    fn test_successful_prediction_keeps_track_alive() {
        let mut tm = TrackManager::new(config(1), Box::new(VelocityPredictor::new(5)));
        let id = tm.update(Some(&[r(10, 10, 50, 50)]), W, H).created[0];
        tm.update(Some(&[r(14, 10, 50, 50)]), W, H);

        for _ in 0..3 {
            tm.update(None, W, H);
        }
        let track = tm.get(id).unwrap();
        assert_eq!(track.lost_frames(), 0);
        assert_eq!(track.region(), r(26, 10, 50, 50));
    }

    #[test]
    fn test_lost_track_recovers_before_limit() {
        let mut tm = manager(5);
        let id = tm.update(Some(&[r(100, 100, 60, 60)]), W, H).created[0];
        tm.update(Some(&[]), W, H);
        tm.update(Some(&[]), W, H);
        assert_eq!(tm.get(id).unwrap().state(), TrackState::Lost);

        tm.update(Some(&[r(102, 101, 60, 60)]), W, H);
        let track = tm.get(id).unwrap();
        assert_eq!(track.state(), TrackState::Active);
        assert_eq!(track.lost_frames(), 0);
    }

    #[test]
    fn test_greedy_matching_in_detection_order() {
        let mut tm = manager(15);
        let ids = tm.update(Some(&[r(0, 0, 100, 100), r(60, 0, 100, 100)]), W, H).created;
        assert_eq!(ids.len(), 2);

        // Detection A overlaps track 0 well and track 1 less. Detection B
        // overlaps track 0 best, but track 0 is already claimed by A.
        let a = r(5, 0, 100, 100);
        let b = r(30, 0, 100, 100);
        let changes = tm.update(Some(&[a, b]), W, H);

        assert!(changes.created.is_empty());
        assert_eq!(tm.get(ids[0]).unwrap().region(), a);
        assert_eq!(tm.get(ids[1]).unwrap().region(), b);
    }

    #[test]
    fn test_each_track_claimed_at_most_once() {
        let mut tm = manager(15);
        let id = tm.update(Some(&[r(0, 0, 100, 100)]), W, H).created[0];

        let changes = tm.update(Some(&[r(1, 0, 100, 100), r(2, 0, 100, 100)]), W, H);
        assert_eq!(changes.created.len(), 1);
        assert_eq!(tm.get(id).unwrap().region(), r(1, 0, 100, 100));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut tm = manager(0);
        let mut seen = HashSet::new();
        for i in 0..20 {
            let x = (i % 4) * 150;
            let changes = tm.update(Some(&[r(x, 0, 50, 50)]), W, H);
            for id in changes.created {
                assert!(seen.insert(id), "track id {id} reused");
            }
            let live: HashSet<_> = tm.tracks().iter().map(|t| t.id()).collect();
            assert_eq!(live.len(), tm.len());
        }
    }
}
