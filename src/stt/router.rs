// Transcription routing: the streaming backend answers confirmations,
// the batch backend handles everything else.

use super::{StreamingTranscriber, Transcriber};
use crate::warn;

/// What kind of utterance is being transcribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionContext {
    /// Free-form command, handled by the batch backend
    General,
    /// Short yes/no reply, handled by the streaming backend
    Confirmation,
}

/// Chunk size fed to the streaming backend, matching the capture frame.
const STREAM_CHUNK: usize = 512;

pub struct SttRouter {
    general: Box<dyn Transcriber>,
    confirm: Box<dyn StreamingTranscriber>,
}

impl SttRouter {
    pub fn new(general: Box<dyn Transcriber>, confirm: Box<dyn StreamingTranscriber>) -> Self {
        Self { general, confirm }
    }

    /// Transcribe a buffered utterance. Backend failures are logged and
    /// surface as an empty transcript, never as an error.
    pub fn transcribe(&mut self, audio: &[i16], context: TranscriptionContext) -> String {
        match context {
            TranscriptionContext::Confirmation => {
                self.confirm.reset();
                for chunk in audio.chunks(STREAM_CHUNK) {
                    match self.confirm.feed_frame(chunk) {
                        Ok(Some(text)) if !text.trim().is_empty() => return text,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("[stt] streaming transcription failed: {e}");
                            return String::new();
                        }
                    }
                }
                String::new()
            }
            TranscriptionContext::General => match self.general.transcribe(audio) {
                Ok(text) => text.trim().to_lowercase(),
                Err(e) => {
                    warn!("[stt] batch transcription failed: {e}");
                    String::new()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::SttError;

    struct FixedTranscriber(Result<String, SttError>);

    impl Transcriber for FixedTranscriber {
        fn transcribe(&mut self, _audio: &[i16]) -> Result<String, SttError> {
            self.0.clone()
        }
    }

    /// Streaming mock that finalizes after a given number of chunks.
    struct CountingStream {
        finalize_after: usize,
        fed: usize,
        text: String,
    }

    impl CountingStream {
        fn new(finalize_after: usize, text: &str) -> Self {
            Self {
                finalize_after,
                fed: 0,
                text: text.to_string(),
            }
        }
    }

    impl StreamingTranscriber for CountingStream {
        fn feed_frame(&mut self, _frame: &[i16]) -> Result<Option<String>, SttError> {
            self.fed += 1;
            if self.fed >= self.finalize_after {
                Ok(Some(self.text.clone()))
            } else {
                Ok(None)
            }
        }

        fn reset(&mut self) {
            self.fed = 0;
        }
    }

    #[test]
    fn test_general_is_lowercased_and_trimmed() {
        let mut router = SttRouter::new(
            Box::new(FixedTranscriber(Ok("  Включи Музыку  ".to_string()))),
            Box::new(CountingStream::new(1, "да")),
        );
        let text = router.transcribe(&[0; 1024], TranscriptionContext::General);
        assert_eq!(text, "включи музыку");
    }

    #[test]
    fn test_general_error_becomes_empty() {
        let mut router = SttRouter::new(
            Box::new(FixedTranscriber(Err(SttError::TranscriptionFailed(
                "boom".into(),
            )))),
            Box::new(CountingStream::new(1, "да")),
        );
        assert_eq!(
            router.transcribe(&[0; 1024], TranscriptionContext::General),
            ""
        );
    }

    #[test]
    fn test_confirmation_returns_first_finalized_result() {
        let mut router = SttRouter::new(
            Box::new(FixedTranscriber(Ok("unused".to_string()))),
            Box::new(CountingStream::new(2, "да")),
        );
        // Three chunks of audio; the stream finalizes on the second
        let text = router.transcribe(&[0; 1536], TranscriptionContext::Confirmation);
        assert_eq!(text, "да");
    }

    #[test]
    fn test_confirmation_without_finalized_result_is_empty() {
        let mut router = SttRouter::new(
            Box::new(FixedTranscriber(Ok("unused".to_string()))),
            Box::new(CountingStream::new(100, "да")),
        );
        assert_eq!(
            router.transcribe(&[0; 1536], TranscriptionContext::Confirmation),
            ""
        );
    }

    #[test]
    fn test_confirmation_skips_blank_finalizations() {
        let mut router = SttRouter::new(
            Box::new(FixedTranscriber(Ok("unused".to_string()))),
            Box::new(CountingStream::new(1, "   ")),
        );
        assert_eq!(
            router.transcribe(&[0; 1536], TranscriptionContext::Confirmation),
            ""
        );
    }
}
