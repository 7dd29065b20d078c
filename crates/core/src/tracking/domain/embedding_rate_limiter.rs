use std::time::{Duration, Instant};

/// Spaces embedding requests for a single track at least `interval` apart.
///
/// The limiter itself is stateless; the per-track timestamp lives on the
/// track and is only written once a request was actually enqueued.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddingRateLimiter {
    interval: Duration,
}

impl EmbeddingRateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// True when the track never asked for an embedding, or its last request
    /// is at least `interval` old.
    pub fn is_due(&self, last_request: Option<Instant>, now: Instant) -> bool {
        match last_request {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}
