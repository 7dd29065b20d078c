use std::io::Write;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::speech::domain::speech_recognizer::{ListenPolicy, SpeechRecognizer};
use crate::speech::domain::speech_synthesizer::{SpeechError, SpeechSynthesizer};

/// Text-mode speech: replies are printed, and "heard" utterances are lines
/// fed in through a [`ConsoleInput`].
pub struct ConsoleSpeech {
    lines_tx: Sender<String>,
    lines_rx: Receiver<String>,
}

/// Handle for feeding typed lines to a [`ConsoleSpeech`].
#[derive(Clone)]
pub struct ConsoleInput {
    lines_tx: Sender<String>,
}

impl ConsoleInput {
    pub fn send_line(&self, line: &str) {
        let _ = self.lines_tx.send(line.trim().to_string());
    }
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        let (lines_tx, lines_rx) = crossbeam_channel::unbounded();
        Self { lines_tx, lines_rx }
    }

    pub fn input(&self) -> ConsoleInput {
        ConsoleInput {
            lines_tx: self.lines_tx.clone(),
        }
    }

    fn next_line(&self, timeout: Duration) -> String {
        match self.lines_rx.recv_timeout(timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => String::new(),
        }
    }
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for ConsoleSpeech {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "Robot: {text}")?;
        out.flush()?;
        Ok(())
    }
}

impl SpeechRecognizer for ConsoleSpeech {
    fn listen(&self, policy: &ListenPolicy) -> Result<String, SpeechError> {
        Ok(self.next_line(policy.max_duration))
    }
}
