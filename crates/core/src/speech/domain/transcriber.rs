use super::speech_synthesizer::SpeechError;

/// Speech-to-text over an already captured utterance.
pub trait Transcriber: Send + Sync {
    /// `samples` are mono and normalized to [-1.0, 1.0].
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, SpeechError>;
}
