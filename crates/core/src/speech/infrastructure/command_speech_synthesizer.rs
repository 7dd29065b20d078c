use std::process::{Command, Stdio};

use crate::speech::domain::speech_synthesizer::{SpeechError, SpeechSynthesizer};

/// Speaks by running an external TTS program (e.g. `espeak-ng -v it`) with
/// the text appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandSpeechSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSpeechSynthesizer {
    pub fn new(command: &[String]) -> Result<Self, SpeechError> {
        let (program, args) = command.split_first().ok_or("speak command is empty")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl SpeechSynthesizer for CommandSpeechSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        log::debug!("Speaking: {text}");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| format!("failed to run {}: {e}", self.program))?;
        if !status.success() {
            return Err(format!("{} exited with {status}", self.program).into());
        }
        Ok(())
    }
}
