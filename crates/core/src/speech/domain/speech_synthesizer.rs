pub type SpeechError = Box<dyn std::error::Error + Send + Sync>;

/// Text-to-speech output.
pub trait SpeechSynthesizer: Send + Sync {
    /// Blocks until playback has finished.
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
}
