pub mod speech_recognizer;
pub mod speech_synthesizer;
pub mod transcriber;
pub mod utterance_capture;
