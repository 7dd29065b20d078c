use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::conversation::infrastructure::task_queue::TaskQueue;
use crate::interaction::interaction_dispatcher::InteractionDispatcher;
use crate::perception::infrastructure::perception_worker::{DetectionWorker, EmbeddingWorker};
use crate::shared::shutdown::ShutdownSignal;
use crate::video::domain::frame_source::{FrameSource, SourceError};

use super::frame_processor::{FrameProcessor, PerceptionQueues};
use super::recognition_stats::RecognitionStats;

/// Upper bound on waiting for model warm-up before frames flow anyway.
const WARM_UP_TIMEOUT: Duration = Duration::from_secs(120);
/// Upper bound on waiting for a running conversation at shutdown.
const CONVERSATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("failed to open frame source: {0}")]
    OpenSource(#[source] SourceError),
}

/// Long-lived collaborators shared by the recognition loop, built once at
/// startup and torn down in a fixed order.
pub struct RecognitionContext {
    pub shutdown: ShutdownSignal,
    pub detection: DetectionWorker,
    pub embedding: EmbeddingWorker,
    pub dispatcher: Arc<InteractionDispatcher>,
    /// Speech and dialogue executors used by conversations.
    pub task_queues: Vec<Arc<TaskQueue>>,
}

impl RecognitionContext {
    /// Stops everything after the capture loop has exited: conversations,
    /// then task queues, then perception workers.
    fn shut_down(self) {
        self.shutdown.trigger();

        if self.dispatcher.active_count() > 0 {
            log::info!("Waiting for the active conversation to end...");
        }
        if !self.dispatcher.wait_idle(CONVERSATION_DRAIN_TIMEOUT) {
            log::warn!(
                "Conversation still running after {CONVERSATION_DRAIN_TIMEOUT:?}, continuing shutdown"
            );
        }

        for queue in &self.task_queues {
            queue.shutdown();
        }

        for result in [self.detection.join(), self.embedding.join()] {
            if let Err(e) = result {
                log::error!("{e}");
            }
        }
    }
}

/// Pulls frames until end of stream or shutdown, feeding each through the
/// [`FrameProcessor`].
pub struct RecognitionLoop {
    context: RecognitionContext,
    processor: FrameProcessor,
    source: Box<dyn FrameSource>,
}

impl RecognitionLoop {
    pub fn new(
        context: RecognitionContext,
        processor: FrameProcessor,
        source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            context,
            processor,
            source,
        }
    }

    /// Runs to completion and returns the collected statistics, already
    /// logged.
    pub fn run(self) -> Result<RecognitionStats, RecognitionError> {
        let Self {
            context,
            mut processor,
            mut source,
        } = self;

        let info = match source.open() {
            Ok(info) => info,
            Err(e) => {
                context.shut_down();
                return Err(RecognitionError::OpenSource(e));
            }
        };
        log::info!(
            "Capturing {} ({}x{} @ {:.1} fps)",
            info.description,
            info.width,
            info.height,
            info.fps
        );

        let ready = [
            (context.detection.name(), context.detection.wait_ready(WARM_UP_TIMEOUT)),
            (context.embedding.name(), context.embedding.wait_ready(WARM_UP_TIMEOUT)),
        ];
        for (worker, is_ready) in ready {
            if !is_ready {
                log::warn!("{worker} worker not ready after {WARM_UP_TIMEOUT:?}");
            }
        }

        {
            let queues = PerceptionQueues {
                detection: &context.detection,
                embedding: &context.embedding,
            };
            while !context.shutdown.is_triggered() {
                match source.next_frame() {
                    None => {
                        log::info!("End of stream");
                        break;
                    }
                    Some(Err(e)) => {
                        log::error!("Frame read failed: {e}");
                        break;
                    }
                    Some(Ok(frame)) => {
                        let now = frame.captured_at();
                        processor.process(frame, now, &queues, &context.dispatcher);
                    }
                }
            }
        }

        context.shut_down();
        source.close();

        let stats = processor.into_stats();
        stats.log_summary();
        Ok(stats)
    }
}
