use std::time::Duration;

use super::speech_synthesizer::SpeechError;

/// Bounds for a single listen call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenPolicy {
    pub max_duration: Duration,
    /// Stop early once the speaker falls silent.
    pub stop_on_silence: bool,
}

impl ListenPolicy {
    pub fn new(max_duration: Duration) -> Self {
        Self {
            max_duration,
            stop_on_silence: true,
        }
    }
}

/// Speech-to-text input.
pub trait SpeechRecognizer: Send + Sync {
    /// Blocks until speech ends, the silence limit is hit or `max_duration`
    /// elapses. Returns an empty string when nothing was understood.
    fn listen(&self, policy: &ListenPolicy) -> Result<String, SpeechError>;
}
