pub mod command_speech_synthesizer;
pub mod console_speech;
pub mod microphone_recognizer;
pub mod whisper_transcriber;
