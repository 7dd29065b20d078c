use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::shared::settings::AudioSettings;
use crate::speech::domain::speech_recognizer::{ListenPolicy, SpeechRecognizer};
use crate::speech::domain::speech_synthesizer::SpeechError;
use crate::speech::domain::transcriber::Transcriber;
use crate::speech::domain::utterance_capture::{
    CaptureConfig, CaptureEnd, CaptureStatus, UtteranceCapture,
};

/// Chunks per second read from the capture stream.
const CHUNKS_PER_SECOND: u32 = 10;

/// Records one utterance from a capture program streaming raw 16-bit
/// little-endian mono PCM on stdout (e.g. `arecord -t raw -f S16_LE`), then
/// transcribes it.
pub struct MicrophoneRecognizer {
    program: String,
    args: Vec<String>,
    sample_rate: u32,
    energy_threshold: f32,
    silence_limit: Duration,
    silence_hangover: Duration,
    speech_max: Duration,
    transcriber: Box<dyn Transcriber>,
}

impl MicrophoneRecognizer {
    pub fn new(settings: &AudioSettings, transcriber: Box<dyn Transcriber>) -> Result<Self, SpeechError> {
        let (program, args) = settings
            .capture_command
            .split_first()
            .ok_or("capture command is empty")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            sample_rate: settings.sample_rate,
            energy_threshold: settings.energy_threshold,
            silence_limit: Duration::from_secs_f64(settings.silence_limit_secs),
            silence_hangover: Duration::from_secs_f64(settings.silence_hangover_secs),
            speech_max: Duration::from_secs_f64(settings.speech_max_secs),
            transcriber,
        })
    }

    fn capture_config(&self, policy: &ListenPolicy) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            energy_threshold: self.energy_threshold,
            silence_limit: self.silence_limit,
            silence_hangover: self.silence_hangover,
            max_duration: policy.max_duration.min(self.speech_max),
            stop_on_silence: policy.stop_on_silence,
        }
    }

    fn record(&self, policy: &ListenPolicy) -> Result<UtteranceCapture, SpeechError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", self.program))?;

        let result = self.read_utterance(&mut child, policy);
        let _ = child.kill();
        let _ = child.wait();
        result
    }

    fn read_utterance(
        &self,
        child: &mut Child,
        policy: &ListenPolicy,
    ) -> Result<UtteranceCapture, SpeechError> {
        let mut stdout = child.stdout.take().ok_or("capture program has no stdout")?;
        let mut capture = UtteranceCapture::new(self.capture_config(policy));
        let chunk_samples = (self.sample_rate / CHUNKS_PER_SECOND).max(1) as usize;
        let mut bytes = vec![0u8; chunk_samples * 2];

        loop {
            match stdout.read_exact(&mut bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    log::debug!("Capture stream from {} ended", self.program);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            let chunk: Vec<i16> = bytes
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            if let CaptureStatus::Done(end) = capture.push(&chunk) {
                log_capture_end(end, &capture);
                break;
            }
        }
        Ok(capture)
    }
}

fn log_capture_end(end: CaptureEnd, capture: &UtteranceCapture) {
    match end {
        CaptureEnd::SpeechEnded => log::debug!("Utterance of {:?} captured", capture.captured()),
        CaptureEnd::NoSpeech => log::debug!("No speech within {:?}", capture.captured()),
        CaptureEnd::MaxDuration => log::debug!("Capture hit its limit of {:?}", capture.captured()),
    }
}

impl SpeechRecognizer for MicrophoneRecognizer {
    fn listen(&self, policy: &ListenPolicy) -> Result<String, SpeechError> {
        let capture = self.record(policy)?;
        if !capture.heard_speech() {
            return Ok(String::new());
        }
        let samples = capture.into_samples();
        let text = self.transcriber.transcribe(&samples, self.sample_rate)?;
        log::info!("Heard: \"{text}\"");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const RATE: u32 = 1000;

    struct CountingTranscriber {
        calls: Arc<AtomicUsize>,
        samples_seen: Arc<AtomicUsize>,
    }

    impl Transcriber for CountingTranscriber {
        fn transcribe(&self, samples: &[f32], _sample_rate: u32) -> Result<String, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.samples_seen.store(samples.len(), Ordering::SeqCst);
            Ok("ciao".into())
        }
    }

    /// Writes `(amplitude, chunks)` runs of 100 ms PCM to a temp file.
    fn pcm_file(runs: &[(i16, usize)]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for &(amplitude, chunks) in runs {
            for i in 0..(RATE as usize / 10) * chunks {
                let s = if i % 2 == 0 { amplitude } else { -amplitude };
                file.write_all(&s.to_le_bytes()).unwrap();
            }
        }
        file.flush().unwrap();
        file
    }

    fn recognizer(file: &NamedTempFile) -> (MicrophoneRecognizer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let samples_seen = Arc::new(AtomicUsize::new(0));
        let settings = AudioSettings {
            sample_rate: RATE,
            energy_threshold: 0.1,
            silence_limit_secs: 0.5,
            silence_hangover_secs: 0.2,
            speech_max_secs: 10.0,
            capture_command: vec!["cat".into(), file.path().to_string_lossy().into_owned()],
            ..Default::default()
        };
        let transcriber = CountingTranscriber {
            calls: calls.clone(),
            samples_seen: samples_seen.clone(),
        };
        (
            MicrophoneRecognizer::new(&settings, Box::new(transcriber)).unwrap(),
            calls,
            samples_seen,
        )
    }

    #[test]
    fn test_speech_then_pause_is_transcribed() {
        let file = pcm_file(&[(0, 1), (16000, 3), (0, 10)]);
        let (mic, calls, samples_seen) = recognizer(&file);

        let text = mic.listen(&ListenPolicy::new(Duration::from_secs(5))).unwrap();

        assert_eq!(text, "ciao");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(samples_seen.load(Ordering::SeqCst), 600);
    }

    #[test]
    fn test_silence_only_skips_transcription() {
        let file = pcm_file(&[(0, 20)]);
        let (mic, calls, _) = recognizer(&file);

        let text = mic.listen(&ListenPolicy::new(Duration::from_secs(5))).unwrap();

        assert_eq!(text, "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stream_ending_mid_speech_still_transcribes() {
        let file = pcm_file(&[(16000, 2)]);
        let (mic, calls, _) = recognizer(&file);

        assert_eq!(mic.listen(&ListenPolicy::new(Duration::from_secs(5))).unwrap(), "ciao");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_capture_program_is_error() {
        let settings = AudioSettings {
            capture_command: vec!["/nonexistent/recorder".into()],
            ..Default::default()
        };
        let transcriber = CountingTranscriber {
            calls: Arc::default(),
            samples_seen: Arc::default(),
        };
        let mic = MicrophoneRecognizer::new(&settings, Box::new(transcriber)).unwrap();
        assert!(mic.listen(&ListenPolicy::new(Duration::from_secs(1))).is_err());
    }

    #[test]
    fn test_empty_capture_command_is_rejected() {
        let settings = AudioSettings {
            capture_command: Vec::new(),
            ..Default::default()
        };
        let transcriber = CountingTranscriber {
            calls: Arc::default(),
            samples_seen: Arc::default(),
        };
        assert!(MicrophoneRecognizer::new(&settings, Box::new(transcriber)).is_err());
    }
}
