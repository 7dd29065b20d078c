//! Long-lived inference threads fed through bounded crossbeam channels.
//!
//! The capture loop never blocks on a worker: submission is `try_send` and a
//! full request queue drops the new item. Workers dequeue with a timeout so
//! they notice the shutdown signal between requests.
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::perception::domain::detection::DetectionResult;
use crate::perception::domain::face_detector::{FaceDetector, PerceptionError};
use crate::perception::domain::face_embedder::FaceEmbedder;
use crate::perception::domain::perception_request::{EmbeddingRequest, EmbeddingResult};
use crate::shared::frame::Frame;
use crate::shared::shutdown::ShutdownSignal;

/// One unit of inference work owned by a worker thread.
///
/// `process` must not fail: inference errors are turned into the response's
/// failure marker. A panic inside `process` is caught by the worker, which
/// then sends the marker returned by `failed` for that request.
pub trait PerceptionTask: Send + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    fn warm_up(&mut self) -> Result<(), PerceptionError>;
    fn process(&mut self, request: Self::Request) -> Self::Response;
    fn failed(&self, request: &Self::Request) -> Self::Response;
}

/// Non-blocking submission and draining side of a worker, as seen by the
/// capture loop.
pub trait WorkQueue<Req, Res> {
    /// Enqueues without blocking. Returns `false` when the item was dropped.
    fn try_submit(&self, request: Req) -> bool;

    /// Takes every result currently available.
    fn drain(&self) -> Vec<Res>;
}

pub struct PerceptionWorker<Req, Res> {
    name: &'static str,
    requests: Sender<Req>,
    results: Receiver<Res>,
    ready: Receiver<()>,
    handle: JoinHandle<()>,
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerConfig {
    pub request_capacity: usize,
    pub result_capacity: usize,
    pub dequeue_timeout: Duration,
}

impl<Req: Send + 'static, Res: Send + 'static> PerceptionWorker<Req, Res> {
    pub fn spawn<T>(
        name: &'static str,
        task: T,
        config: WorkerConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self, std::io::Error>
    where
        T: PerceptionTask<Request = Req, Response = Res>,
    {
        let (request_tx, request_rx) = crossbeam_channel::bounded(config.request_capacity.max(1));
        let (result_tx, result_rx) = crossbeam_channel::bounded(config.result_capacity.max(1));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                run_worker(
                    name,
                    task,
                    request_rx,
                    result_tx,
                    ready_tx,
                    config.dequeue_timeout,
                    shutdown,
                )
            })?;

        Ok(Self {
            name,
            requests: request_tx,
            results: result_rx,
            ready: ready_rx,
            handle,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Blocks until warm-up finished, or `timeout` elapsed. A worker that
    /// died during warm-up never becomes ready.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.recv_timeout(timeout).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Closes the request queue and waits for the thread to exit.
    pub fn join(self) -> Result<(), String> {
        let Self {
            name,
            requests,
            handle,
            ..
        } = self;
        drop(requests);
        handle
            .join()
            .map_err(|_| format!("{name} worker panicked"))
    }
}

impl<Req, Res> WorkQueue<Req, Res> for PerceptionWorker<Req, Res> {
    fn try_submit(&self, request: Req) -> bool {
        match self.requests.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("{} queue full, dropping request", self.name);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn drain(&self) -> Vec<Res> {
        self.results.try_iter().collect()
    }
}

fn run_worker<T: PerceptionTask>(
    name: &'static str,
    mut task: T,
    requests: Receiver<T::Request>,
    results: Sender<T::Response>,
    ready: Sender<()>,
    dequeue_timeout: Duration,
    shutdown: ShutdownSignal,
) {
    let started = std::time::Instant::now();
    match task.warm_up() {
        Ok(()) => log::info!("{name} worker ready in {:.0?}", started.elapsed()),
        Err(e) => log::warn!("{name} warm-up failed: {e}"),
    }
    let _ = ready.send(());

    while !shutdown.is_triggered() {
        let request = match requests.recv_timeout(dequeue_timeout) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let marker = task.failed(&request);
        let response = match std::panic::catch_unwind(AssertUnwindSafe(|| task.process(request))) {
            Ok(response) => response,
            Err(_) => {
                log::error!("{name} inference panicked, reporting failure");
                marker
            }
        };
        match results.try_send(response) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::debug!("{name} result queue full, dropping"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    log::debug!("{name} worker stopped");
}

/// Runs face detection on whole frames.
pub struct DetectionTask {
    detector: Box<dyn FaceDetector>,
}

impl DetectionTask {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }
}

impl PerceptionTask for DetectionTask {
    type Request = Arc<Frame>;
    type Response = DetectionResult;

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        self.detector.warm_up()
    }

    fn process(&mut self, frame: Arc<Frame>) -> DetectionResult {
        match self.detector.detect(&frame) {
            Ok(detections) => DetectionResult::found(frame.sequence(), detections),
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.sequence());
                DetectionResult::failed(frame.sequence())
            }
        }
    }

    fn failed(&self, frame: &Arc<Frame>) -> DetectionResult {
        DetectionResult::failed(frame.sequence())
    }
}

/// Computes identity embeddings for individual tracked faces.
pub struct EmbeddingTask {
    embedder: Box<dyn FaceEmbedder>,
}

impl EmbeddingTask {
    pub fn new(embedder: Box<dyn FaceEmbedder>) -> Self {
        Self { embedder }
    }
}

impl PerceptionTask for EmbeddingTask {
    type Request = EmbeddingRequest;
    type Response = EmbeddingResult;

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        self.embedder.warm_up()
    }

    fn process(&mut self, request: EmbeddingRequest) -> EmbeddingResult {
        let embedding = match self.embedder.embed(&request.frame, &request.region) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                log::warn!("Embedding failed for track {}: {e}", request.track_id);
                None
            }
        };
        EmbeddingResult {
            track_id: request.track_id,
            embedding,
        }
    }

    fn failed(&self, request: &EmbeddingRequest) -> EmbeddingResult {
        EmbeddingResult {
            track_id: request.track_id,
            embedding: None,
        }
    }
}

pub type DetectionWorker = PerceptionWorker<Arc<Frame>, DetectionResult>;
pub type EmbeddingWorker = PerceptionWorker<EmbeddingRequest, EmbeddingResult>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::domain::detection::Detection;
    use crate::perception::domain::embedding::Embedding;
    use crate::shared::region::Region;
    use crate::tracking::domain::track::TrackId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const READY_TIMEOUT: Duration = Duration::from_secs(5);

    fn config(request_capacity: usize) -> WorkerConfig {
        WorkerConfig {
            request_capacity,
            result_capacity: 8,
            dequeue_timeout: Duration::from_millis(10),
        }
    }

    fn frame(sequence: u64) -> Arc<Frame> {
        Arc::new(Frame::new(vec![0u8; 12], 2, 2, 3, sequence))
    }

    fn collect<Req, Res>(worker: &PerceptionWorker<Req, Res>, n: usize) -> Vec<Res> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < n && Instant::now() < deadline {
            out.extend(worker.drain());
            std::thread::sleep(Duration::from_millis(5));
        }
        out
    }

    struct FakeDetector {
        fail_on: Option<u64>,
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
            if self.fail_on == Some(frame.sequence()) {
                return Err("model exploded".into());
            }
            Ok(vec![Detection::new(Region::new(0, 0, 1, 1), 0.99)])
        }
    }

    /// Blocks in `process` until released, so queue capacity can be observed.
    struct GatedTask {
        gate: Receiver<()>,
        processed: Arc<AtomicUsize>,
    }

    impl PerceptionTask for GatedTask {
        type Request = u32;
        type Response = u32;

        fn warm_up(&mut self) -> Result<(), PerceptionError> {
            Ok(())
        }

        fn process(&mut self, request: u32) -> u32 {
            let _ = self.gate.recv();
            self.processed.fetch_add(1, Ordering::SeqCst);
            request
        }

        fn failed(&self, _request: &u32) -> u32 {
            0
        }
    }

    struct FailingWarmUp;

    impl PerceptionTask for FailingWarmUp {
        type Request = u32;
        type Response = u32;

        fn warm_up(&mut self) -> Result<(), PerceptionError> {
            Err("no model".into())
        }

        fn process(&mut self, request: u32) -> u32 {
            request * 2
        }

        fn failed(&self, _request: &u32) -> u32 {
            0
        }
    }

    #[test]
    fn test_detection_worker_reports_results_and_failures() {
        let shutdown = ShutdownSignal::new();
        let task = DetectionTask::new(Box::new(FakeDetector { fail_on: Some(2) }));
        let worker = DetectionWorker::spawn("detect", task, config(4), shutdown.clone()).unwrap();
        assert!(worker.wait_ready(READY_TIMEOUT));

        for seq in 1..=3 {
            assert!(worker.try_submit(frame(seq)));
        }
        let results = collect(&worker, 3);

        assert_eq!(results.len(), 3);
        assert!(results[0].detections.is_some());
        assert_eq!(results[1], DetectionResult::failed(2));
        assert_eq!(results[2].frame_sequence, 3);

        shutdown.trigger();
        worker.join().unwrap();
    }

    #[test]
    fn test_full_request_queue_drops_newest() {
        let shutdown = ShutdownSignal::new();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let processed = Arc::new(AtomicUsize::new(0));
        let task = GatedTask {
            gate: gate_rx,
            processed: processed.clone(),
        };
        let worker: PerceptionWorker<u32, u32> =
            PerceptionWorker::spawn("gated", task, config(1), shutdown.clone()).unwrap();
        assert!(worker.wait_ready(READY_TIMEOUT));

        // First request is picked up and blocks on the gate.
        assert!(worker.try_submit(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.requests.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(worker.try_submit(2));
        assert!(!worker.try_submit(3));

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        let results = collect(&worker, 2);
        assert_eq!(results, vec![1, 2]);
        assert_eq!(processed.load(Ordering::SeqCst), 2);

        shutdown.trigger();
        drop(gate_tx);
        worker.join().unwrap();
    }

    #[test]
    fn test_failed_warm_up_still_signals_ready() {
        let shutdown = ShutdownSignal::new();
        let worker: PerceptionWorker<u32, u32> =
            PerceptionWorker::spawn("warm", FailingWarmUp, config(2), shutdown.clone()).unwrap();
        assert!(worker.wait_ready(READY_TIMEOUT));
        assert!(worker.try_submit(21));
        assert_eq!(collect(&worker, 1), vec![42]);

        shutdown.trigger();
        worker.join().unwrap();
    }

    #[test]
    fn test_panicking_detector_reports_failure_and_keeps_running() {
        struct PanicOnce {
            calls: usize,
        }

        impl FaceDetector for PanicOnce {
            fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
                self.calls += 1;
                if self.calls == 1 {
                    panic!("inference crashed");
                }
                Ok(vec![Detection::new(Region::new(0, 0, 1, 1), 0.9)])
            }
        }

        let shutdown = ShutdownSignal::new();
        let task = DetectionTask::new(Box::new(PanicOnce { calls: 0 }));
        let worker = DetectionWorker::spawn("panicky", task, config(4), shutdown.clone()).unwrap();
        assert!(worker.wait_ready(READY_TIMEOUT));

        assert!(worker.try_submit(frame(1)));
        assert_eq!(collect(&worker, 1), vec![DetectionResult::failed(1)]);

        assert!(worker.try_submit(frame(2)));
        let results = collect(&worker, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].frame_sequence, 2);
        assert!(results[0].detections.is_some());
        assert!(!worker.is_finished());

        shutdown.trigger();
        worker.join().unwrap();
    }

    #[test]
    fn test_worker_exits_on_shutdown() {
        let shutdown = ShutdownSignal::new();
        let worker: PerceptionWorker<u32, u32> =
            PerceptionWorker::spawn("idle", FailingWarmUp, config(2), shutdown.clone()).unwrap();
        assert!(worker.wait_ready(READY_TIMEOUT));
        shutdown.trigger();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_finished());
        worker.join().unwrap();
    }

    #[test]
    fn test_embedding_task_marks_failure_as_absent() {
        struct FakeEmbedder;
        impl FaceEmbedder for FakeEmbedder {
            fn embed(&mut self, _f: &Frame, region: &Region) -> Result<Embedding, PerceptionError> {
                if region.width == 0 {
                    return Err("empty crop".into());
                }
                Ok(Embedding::new(vec![1.0, 0.0]))
            }
        }

        let mut task = EmbeddingTask::new(Box::new(FakeEmbedder));
        let ok = task.process(EmbeddingRequest {
            track_id: TrackId::new(4),
            frame: frame(1),
            region: Region::new(0, 0, 2, 2),
        });
        let failed = task.process(EmbeddingRequest {
            track_id: TrackId::new(5),
            frame: frame(1),
            region: Region::new(0, 0, 0, 2),
        });

        assert_eq!(ok.track_id, TrackId::new(4));
        assert_eq!(ok.embedding, Some(Embedding::new(vec![1.0, 0.0])));
        assert_eq!(failed.track_id, TrackId::new(5));
        assert!(failed.embedding.is_none());
    }
}
