use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use whisper_rs::{
    install_logging_hooks, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
};

use crate::speech::domain::speech_synthesizer::SpeechError;
use crate::speech::domain::transcriber::Transcriber;

static LOGGING_HOOKS: Once = Once::new();

/// Whisper expects 16 kHz mono input.
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Transcriber using whisper.cpp via whisper-rs.
///
/// The model is loaded once; each call gets a fresh decoding state.
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    model_path: PathBuf,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path, language: &str) -> Result<Self, SpeechError> {
        if !model_path.exists() {
            return Err(format!("Whisper model not found at: {}", model_path.display()).into());
        }
        LOGGING_HOOKS.call_once(install_logging_hooks);

        let context = WhisperContext::new_with_params(
            model_path.to_str().ok_or("Invalid model path")?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        log::info!("Loaded Whisper model {}", model_path.display());
        Ok(Self {
            context: Mutex::new(context),
            model_path: model_path.to_path_buf(),
            language: language.to_string(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, SpeechError> {
        if sample_rate != WHISPER_SAMPLE_RATE {
            return Err(format!(
                "Whisper needs {WHISPER_SAMPLE_RATE} Hz audio, got {sample_rate} Hz"
            )
            .into());
        }
        if samples.is_empty() {
            return Ok(String::new());
        }

        let context = self
            .context
            .lock()
            .map_err(|e| format!("Whisper context poisoned: {e}"))?;
        let mut state = context
            .create_state()
            .map_err(|e| format!("Failed to create Whisper state: {e}"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.language));
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(num_cpus().min(4) as i32);

        state
            .full(params, samples)
            .map_err(|e| format!("Whisper inference failed: {e}"))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }
        Ok(strip_annotations(&text))
    }
}

/// Drops bracketed non-speech markers such as `[Musica]` or `(risate)`.
fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
