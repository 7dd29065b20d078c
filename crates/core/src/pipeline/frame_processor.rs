//! One step of the recognition loop: detection → tracking → embedding →
//! identity → dispatch, without ever blocking on a worker.
use std::sync::Arc;
use std::time::Instant;

use crate::identity::domain::identity::InteractionKey;
use crate::identity::domain::identity_resolver::IdentityResolver;
use crate::interaction::conversation_runner::ConversationRequest;
use crate::interaction::interaction_dispatcher::{DispatchDecision, DispatchError, InteractionDispatcher};
use crate::perception::domain::detection::DetectionResult;
use crate::perception::domain::perception_request::{EmbeddingRequest, EmbeddingResult};
use crate::perception::infrastructure::perception_worker::WorkQueue;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::tracking::domain::embedding_rate_limiter::EmbeddingRateLimiter;
use crate::tracking::domain::track::{TrackId, TrackState};
use crate::tracking::domain::track_manager::{TrackChanges, TrackManager};

use super::recognition_stats::{Counter, RecognitionStats, Stage};

/// The capture loop's view of the perception workers.
pub struct PerceptionQueues<'a> {
    pub detection: &'a dyn WorkQueue<Arc<Frame>, DetectionResult>,
    pub embedding: &'a dyn WorkQueue<EmbeddingRequest, EmbeddingResult>,
}

/// Per-frame state owned by the capture thread.
pub struct FrameProcessor {
    tracks: TrackManager,
    limiter: EmbeddingRateLimiter,
    resolver: IdentityResolver,
    stats: RecognitionStats,
}

impl FrameProcessor {
    pub fn new(tracks: TrackManager, limiter: EmbeddingRateLimiter, resolver: IdentityResolver) -> Self {
        Self {
            tracks,
            limiter,
            resolver,
            stats: RecognitionStats::new(),
        }
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    pub fn stats(&self) -> &RecognitionStats {
        &self.stats
    }

    pub fn into_stats(self) -> RecognitionStats {
        self.stats
    }

    pub fn process(
        &mut self,
        frame: Frame,
        now: Instant,
        queues: &PerceptionQueues<'_>,
        dispatcher: &InteractionDispatcher,
    ) -> TrackChanges {
        self.stats.increment(Counter::Frames);
        let (width, height) = (frame.width(), frame.height());
        let frame = Arc::new(frame);

        let detections = self.poll_detections(&frame, queues.detection);

        let changes = self.stats.time(Stage::Track, || {
            self.tracks.update(detections.as_deref(), width, height)
        });
        self.record_changes(&changes);

        let start = Instant::now();
        self.submit_embeddings(&frame, now, queues.embedding);
        self.stats.timing(Stage::EmbedSubmit, start.elapsed());

        let start = Instant::now();
        for result in queues.embedding.drain() {
            self.resolve_and_dispatch(result, dispatcher);
        }
        self.stats.timing(Stage::Resolve, start.elapsed());

        changes
    }

    /// Offers the frame to the detector and returns the boxes of the newest
    /// finished detection, if any.
    fn poll_detections(
        &mut self,
        frame: &Arc<Frame>,
        queue: &dyn WorkQueue<Arc<Frame>, DetectionResult>,
    ) -> Option<Vec<Region>> {
        let start = Instant::now();
        if !queue.try_submit(frame.clone()) {
            self.stats.increment(Counter::DroppedDetectionRequests);
        }
        let newest = queue
            .drain()
            .into_iter()
            .filter(|r| r.detections.is_some())
            .max_by_key(|r| r.frame_sequence);
        self.stats.timing(Stage::DetectPoll, start.elapsed());
        newest.map(|r| r.regions())
    }

    fn record_changes(&mut self, changes: &TrackChanges) {
        for id in &changes.created {
            log::debug!("Track {id} created");
        }
        for id in &changes.removed {
            log::debug!("Track {id} removed");
        }
        self.stats
            .add(Counter::TracksCreated, changes.created.len() as u64);
        self.stats
            .add(Counter::TracksRemoved, changes.removed.len() as u64);
    }

    /// Submits at most one embedding request per active track per interval.
    /// The request time is only recorded when the worker accepted it.
    fn submit_embeddings(
        &mut self,
        frame: &Arc<Frame>,
        now: Instant,
        queue: &dyn WorkQueue<EmbeddingRequest, EmbeddingResult>,
    ) {
        let due: Vec<(TrackId, Region)> = self
            .tracks
            .tracks()
            .iter()
            .filter(|t| t.state() == TrackState::Active)
            .filter(|t| self.limiter.is_due(t.last_embedding_at(), now))
            .map(|t| (t.id(), t.region()))
            .collect();

        for (track_id, region) in due {
            let request = EmbeddingRequest {
                track_id,
                frame: frame.clone(),
                region,
            };
            if queue.try_submit(request) {
                if let Some(track) = self.tracks.get_mut(track_id) {
                    track.record_embedding_request(now);
                }
            } else {
                self.stats.increment(Counter::DroppedEmbeddingRequests);
            }
        }
    }

    fn resolve_and_dispatch(&mut self, result: EmbeddingResult, dispatcher: &InteractionDispatcher) {
        let Some(embedding) = result.embedding else {
            return;
        };
        let identity = self.resolver.resolve(&embedding);
        let key = InteractionKey::for_identity(&identity, result.track_id);
        log::debug!("Track {} resolved as {key}", result.track_id);

        let request = ConversationRequest {
            key,
            identity,
            embedding,
            track_id: result.track_id,
        };
        match dispatcher.dispatch(request) {
            Ok(DispatchDecision::Started) => self.stats.increment(Counter::ConversationsStarted),
            Ok(decision) => log::debug!("Dispatch for track {}: {decision:?}", result.track_id),
            Err(DispatchError::ShuttingDown) => {}
            Err(e) => log::error!("Could not start conversation: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::domain::identity::Identity;
    use crate::identity::domain::known_identities::KnownIdentities;
    use crate::interaction::conversation_runner::{ConversationRunner, RunnerError};
    use crate::perception::domain::detection::Detection;
    use crate::perception::domain::embedding::Embedding;
    use crate::shared::shutdown::ShutdownSignal;
    use crate::tracking::domain::box_predictor::VelocityPredictor;
    use crate::tracking::domain::track_manager::TrackManagerConfig;
    use std::cell::RefCell;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory work queue: records submissions, hands out preloaded
    /// results, and can be told to refuse work.
    struct FakeQueue<Req, Res> {
        accept: bool,
        submitted: RefCell<Vec<Req>>,
        results: RefCell<Vec<Res>>,
    }

    impl<Req, Res> FakeQueue<Req, Res> {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                submitted: RefCell::new(Vec::new()),
                results: RefCell::new(Vec::new()),
            }
        }

        fn push_result(&self, result: Res) {
            self.results.borrow_mut().push(result);
        }
    }

    impl<Req, Res> WorkQueue<Req, Res> for FakeQueue<Req, Res> {
        fn try_submit(&self, request: Req) -> bool {
            if self.accept {
                self.submitted.borrow_mut().push(request);
            }
            self.accept
        }

        fn drain(&self) -> Vec<Res> {
            std::mem::take(&mut *self.results.borrow_mut())
        }
    }

    type DetectionQueue = FakeQueue<Arc<Frame>, DetectionResult>;
    type EmbeddingQueue = FakeQueue<EmbeddingRequest, EmbeddingResult>;

    #[derive(Default)]
    struct RecordingRunner {
        started: Mutex<Vec<InteractionKey>>,
    }

    impl ConversationRunner for RecordingRunner {
        fn run(&self, request: ConversationRequest) -> Result<(), RunnerError> {
            self.started.lock().unwrap().push(request.key);
            Ok(())
        }
    }

    const INTERVAL: Duration = Duration::from_secs(20);

    fn processor() -> FrameProcessor {
        let tracks = TrackManager::new(
            TrackManagerConfig {
                max_lost_frames: 15,
                iou_threshold: 0.3,
            },
            Box::new(VelocityPredictor::new(5)),
        );
        let known = KnownIdentities::new(vec![("Anna".into(), Embedding::new(vec![1.0, 0.0]))]);
        FrameProcessor::new(
            tracks,
            EmbeddingRateLimiter::new(INTERVAL),
            IdentityResolver::new(known, 0.5),
        )
    }

    fn dispatcher(runner: Arc<RecordingRunner>) -> InteractionDispatcher {
        InteractionDispatcher::new(runner, Duration::from_secs(30), ShutdownSignal::new())
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0; 200 * 200 * 3], 200, 200, 3, sequence)
    }

    fn faces(sequence: u64, regions: &[Region]) -> DetectionResult {
        DetectionResult::found(
            sequence,
            regions.iter().map(|&r| Detection::new(r, 0.95)).collect(),
        )
    }

    #[test]
    fn test_detection_creates_track_and_requests_embedding() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));

        detection.push_result(faces(0, &[Region::new(10, 10, 50, 50)]));
        let changes = p.process(frame(0), Instant::now(), &queues, &d);

        assert_eq!(changes.created.len(), 1);
        assert_eq!(detection.submitted.borrow().len(), 1);
        let requests = embedding.submitted.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].track_id, changes.created[0]);
        assert_eq!(requests[0].region, Region::new(10, 10, 50, 50));
        assert_eq!(p.stats().count(Counter::TracksCreated), 1);
    }

    #[test]
    fn test_same_face_keeps_track_id_across_frames() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));
        let now = Instant::now();

        detection.push_result(faces(0, &[Region::new(10, 10, 50, 50)]));
        let first = p.process(frame(0), now, &queues, &d);
        detection.push_result(faces(1, &[Region::new(12, 11, 50, 50)]));
        let second = p.process(frame(1), now, &queues, &d);

        assert!(second.created.is_empty());
        let track = p.tracks().get(first.created[0]).unwrap();
        assert_eq!(track.lost_frames(), 0);
        assert_eq!(track.region(), Region::new(12, 11, 50, 50));
    }

    #[test]
    fn test_embedding_requests_are_rate_limited() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));
        let start = Instant::now();

        for i in 0..30u64 {
            detection.push_result(faces(i, &[Region::new(10, 10, 50, 50)]));
            p.process(frame(i), start + Duration::from_millis(100 * i), &queues, &d);
        }
        assert_eq!(embedding.submitted.borrow().len(), 1);

        detection.push_result(faces(30, &[Region::new(10, 10, 50, 50)]));
        p.process(frame(30), start + INTERVAL, &queues, &d);
        assert_eq!(embedding.submitted.borrow().len(), 2);
    }

    #[test]
    fn test_refused_embedding_request_is_retried_next_frame() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let refusing = EmbeddingQueue::new(false);
        let d = dispatcher(Arc::new(RecordingRunner::default()));
        let now = Instant::now();

        detection.push_result(faces(0, &[Region::new(10, 10, 50, 50)]));
        p.process(
            frame(0),
            now,
            &PerceptionQueues {
                detection: &detection,
                embedding: &refusing,
            },
            &d,
        );
        assert_eq!(p.stats().count(Counter::DroppedEmbeddingRequests), 1);

        let accepting = EmbeddingQueue::new(true);
        detection.push_result(faces(1, &[Region::new(10, 10, 50, 50)]));
        p.process(
            frame(1),
            now,
            &PerceptionQueues {
                detection: &detection,
                embedding: &accepting,
            },
            &d,
        );
        assert_eq!(accepting.submitted.borrow().len(), 1);
    }

    #[test]
    fn test_full_detection_queue_counts_drop() {
        let mut p = processor();
        let detection = DetectionQueue::new(false);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));

        p.process(frame(0), Instant::now(), &queues, &d);
        assert_eq!(p.stats().count(Counter::DroppedDetectionRequests), 1);
        assert_eq!(p.stats().count(Counter::Frames), 1);
    }

    #[test]
    fn test_newest_detection_result_wins() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));

        detection.push_result(faces(5, &[Region::new(100, 100, 40, 40)]));
        detection.push_result(faces(3, &[Region::new(0, 0, 40, 40), Region::new(50, 50, 40, 40)]));
        detection.push_result(DetectionResult::failed(6));
        let changes = p.process(frame(6), Instant::now(), &queues, &d);

        assert_eq!(changes.created.len(), 1);
        assert_eq!(p.tracks().tracks()[0].region(), Region::new(100, 100, 40, 40));
    }

    #[test]
    fn test_without_detection_tracks_self_predict() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let d = dispatcher(Arc::new(RecordingRunner::default()));
        let now = Instant::now();

        detection.push_result(faces(0, &[Region::new(10, 10, 50, 50)]));
        let created = p.process(frame(0), now, &queues, &d).created;
        let changes = p.process(frame(1), now, &queues, &d);

        assert!(changes.removed.is_empty());
        let track = p.tracks().get(created[0]).unwrap();
        assert_eq!(track.state(), TrackState::Active);
    }

    #[test]
    fn test_known_embedding_starts_conversation_by_name() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let runner = Arc::new(RecordingRunner::default());
        let d = dispatcher(runner.clone());

        embedding.push_result(EmbeddingResult {
            track_id: TrackId::new(7),
            embedding: Some(Embedding::new(vec![0.9, 0.1])),
        });
        p.process(frame(0), Instant::now(), &queues, &d);

        assert!(d.wait_idle(Duration::from_secs(5)));
        assert_eq!(
            *runner.started.lock().unwrap(),
            vec![InteractionKey::Name("Anna".into())]
        );
        assert_eq!(p.stats().count(Counter::ConversationsStarted), 1);
    }

    #[test]
    fn test_unknown_embedding_is_keyed_by_track() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let runner = Arc::new(RecordingRunner::default());
        let d = dispatcher(runner.clone());

        embedding.push_result(EmbeddingResult {
            track_id: TrackId::new(3),
            embedding: Some(Embedding::new(vec![-1.0, 0.0])),
        });
        p.process(frame(0), Instant::now(), &queues, &d);

        assert!(d.wait_idle(Duration::from_secs(5)));
        assert_eq!(
            *runner.started.lock().unwrap(),
            vec![InteractionKey::for_identity(&Identity::Unknown, TrackId::new(3))]
        );
    }

    #[test]
    fn test_failed_embedding_dispatches_nothing() {
        let mut p = processor();
        let detection = DetectionQueue::new(true);
        let embedding = EmbeddingQueue::new(true);
        let queues = PerceptionQueues {
            detection: &detection,
            embedding: &embedding,
        };
        let runner = Arc::new(RecordingRunner::default());
        let d = dispatcher(runner.clone());

        embedding.push_result(EmbeddingResult {
            track_id: TrackId::new(1),
            embedding: None,
        });
        p.process(frame(0), Instant::now(), &queues, &d);

        assert_eq!(d.active_count(), 0);
        assert!(runner.started.lock().unwrap().is_empty());
    }
}
