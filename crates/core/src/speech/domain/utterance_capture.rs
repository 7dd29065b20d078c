use std::time::Duration;

/// Endpointing parameters for one utterance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    /// RMS level (0.0 to 1.0) at or above which a chunk counts as speech.
    pub energy_threshold: f32,
    /// Silence before any speech after which capture gives up.
    pub silence_limit: Duration,
    /// Silence after speech that ends the utterance.
    pub silence_hangover: Duration,
    pub max_duration: Duration,
    pub stop_on_silence: bool,
}

/// Why capture stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEnd {
    /// Speech was heard and then the speaker paused.
    SpeechEnded,
    /// Nothing but silence until the silence limit.
    NoSpeech,
    MaxDuration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureStatus {
    Listening,
    Done(CaptureEnd),
}

/// Accumulates 16-bit PCM chunks and decides when an utterance is over.
///
/// Timing is derived from the number of samples seen, not from a clock.
#[derive(Debug)]
pub struct UtteranceCapture {
    config: CaptureConfig,
    samples: Vec<f32>,
    heard_speech: bool,
    leading_silence: usize,
    trailing_silence: usize,
    status: CaptureStatus,
}

impl UtteranceCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            heard_speech: false,
            leading_silence: 0,
            trailing_silence: 0,
            status: CaptureStatus::Listening,
        }
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn captured(&self) -> Duration {
        self.samples_to_duration(self.samples.len())
    }

    /// Feeds one chunk. Chunks after the capture finished are ignored.
    pub fn push(&mut self, chunk: &[i16]) -> CaptureStatus {
        if chunk.is_empty() || self.status != CaptureStatus::Listening {
            return self.status;
        }
        self.samples
            .extend(chunk.iter().map(|&s| s as f32 / 32768.0));

        if calculate_rms(chunk) >= self.config.energy_threshold {
            self.heard_speech = true;
            self.trailing_silence = 0;
        } else if self.heard_speech {
            self.trailing_silence += chunk.len();
        } else {
            self.leading_silence += chunk.len();
        }

        self.status = self.evaluate();
        self.status
    }

    fn evaluate(&self) -> CaptureStatus {
        if self.config.stop_on_silence {
            if self.heard_speech
                && self.samples_to_duration(self.trailing_silence) >= self.config.silence_hangover
            {
                return CaptureStatus::Done(CaptureEnd::SpeechEnded);
            }
            if !self.heard_speech
                && self.samples_to_duration(self.leading_silence) >= self.config.silence_limit
            {
                return CaptureStatus::Done(CaptureEnd::NoSpeech);
            }
        }
        if self.captured() >= self.config.max_duration {
            return CaptureStatus::Done(CaptureEnd::MaxDuration);
        }
        CaptureStatus::Listening
    }

    /// The captured audio, normalized to [-1.0, 1.0].
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    fn samples_to_duration(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / self.config.sample_rate.max(1) as f64)
    }
}

/// Normalized RMS of 16-bit PCM (0.0 silence, ~0.707 full-scale sine).
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}
