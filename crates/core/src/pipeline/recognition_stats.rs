use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Timed steps of the per-frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    DetectPoll,
    Track,
    EmbedSubmit,
    Resolve,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::DetectPoll => "detect_poll",
            Stage::Track => "track",
            Stage::EmbedSubmit => "embed_submit",
            Stage::Resolve => "resolve",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Counter {
    Frames,
    DroppedDetectionRequests,
    DroppedEmbeddingRequests,
    TracksCreated,
    TracksRemoved,
    ConversationsStarted,
}

impl Counter {
    pub fn label(self) -> &'static str {
        match self {
            Counter::Frames => "frames",
            Counter::DroppedDetectionRequests => "dropped_detection_requests",
            Counter::DroppedEmbeddingRequests => "dropped_embedding_requests",
            Counter::TracksCreated => "tracks_created",
            Counter::TracksRemoved => "tracks_removed",
            Counter::ConversationsStarted => "conversations_started",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct StageTotals {
    samples: u64,
    total_ms: f64,
    max_ms: f64,
}

/// Per-stage timings and event counters for the recognition loop, summarized
/// through `log` at shutdown.
#[derive(Debug)]
pub struct RecognitionStats {
    started: Instant,
    timings: BTreeMap<Stage, StageTotals>,
    counters: BTreeMap<Counter, u64>,
}

impl RecognitionStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            timings: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    pub fn timing(&mut self, stage: Stage, duration: Duration) {
        let ms = duration.as_secs_f64() * 1000.0;
        let totals = self.timings.entry(stage).or_default();
        totals.samples += 1;
        totals.total_ms += ms;
        totals.max_ms = totals.max_ms.max(ms);
    }

    /// Runs `f` and records its duration under `stage`.
    pub fn time<R>(&mut self, stage: Stage, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.timing(stage, start.elapsed());
        result
    }

    pub fn increment(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: Counter, n: u64) {
        if n > 0 {
            *self.counters.entry(counter).or_default() += n;
        }
    }

    pub fn count(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    /// Mean duration in milliseconds, if the stage ran at all.
    pub fn average_ms(&self, stage: Stage) -> Option<f64> {
        self.timings
            .get(&stage)
            .filter(|t| t.samples > 0)
            .map(|t| t.total_ms / t.samples as f64)
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let frames = self.count(Counter::Frames);
        let mut lines = vec![format!(
            "Recognition summary ({frames} frames, {elapsed:.1}s total):"
        )];

        for (stage, t) in &self.timings {
            let avg = t.total_ms / t.samples.max(1) as f64;
            lines.push(format!(
                "  {:12}: avg {avg:6.2}ms  max {:7.2}ms  total {:7.0}ms",
                stage.label(),
                t.max_ms,
                t.total_ms
            ));
        }
        for (counter, value) in &self.counters {
            lines.push(format!("  {}: {value}", counter.label()));
        }
        if frames > 0 && elapsed > 0.0 {
            lines.push(format!("  Throughput: {:.1} fps", frames as f64 / elapsed));
        }
        Some(lines.join("\n"))
    }

    pub fn log_summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

impl Default for RecognitionStats {
    fn default() -> Self {
        Self::new()
    }
}
