// Speech-to-text: capability contracts plus the two production backends
// (batch whisper for full utterances, streaming EOU for short replies).

use thiserror::Error;

pub mod confirm;
pub use confirm::EouStt;

pub mod router;
pub use router::{SttRouter, TranscriptionContext};

pub mod whisper;
pub use whisper::WhisperStt;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SttError {
    #[error("STT model load failed: {0}")]
    ModelLoadFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Batch transcriber for a complete buffered utterance.
pub trait Transcriber: Send {
    fn transcribe(&mut self, audio: &[i16]) -> Result<String, SttError>;
}

/// Low-latency streaming transcriber for short replies.
pub trait StreamingTranscriber: Send {
    /// Feed one chunk of audio. Returns `Some(text)` once a non-empty
    /// result has finalized, `None` while recognition is still open.
    fn feed_frame(&mut self, frame: &[i16]) -> Result<Option<String>, SttError>;

    /// Drop buffered audio and partial text for a fresh utterance.
    fn reset(&mut self);
}
