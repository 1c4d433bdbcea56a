// Wake model backed by a streaming transcriber: scores frames by
// whether the recognized text carries the wake phrase.

use crate::stt::StreamingTranscriber;
use crate::warn;

/// Wake phrase spotter over streaming speech recognition.
///
/// Frames are fed to the transcriber continuously; whenever a result
/// finalizes, the text is matched against the configured phrase. Strict
/// matching only: fuzzy similarity on the whole phrase would fire on
/// near-miss phrases.
pub struct PhraseSpotter {
    stt: Box<dyn StreamingTranscriber>,
    phrase: String,
    variants: Vec<String>,
}

impl PhraseSpotter {
    pub fn new(stt: Box<dyn StreamingTranscriber>, phrase: &str) -> Self {
        let phrase = phrase.trim().to_lowercase();
        let mut variants = Vec::new();
        if phrase.contains(' ') {
            // Common recognizer slips for multi-word phrases
            variants.push(phrase.replace(' ', ""));
            variants.push(phrase.replace(' ', "-"));
        }
        Self {
            stt,
            phrase,
            variants,
        }
    }

    /// Match the recognized text against the phrase ladder.
    fn score_transcript(&self, transcript: &str) -> f32 {
        let text = transcript.to_lowercase();

        if text.contains(&self.phrase) {
            return 1.0;
        }
        for variant in &self.variants {
            if text.contains(variant) {
                return 0.95;
            }
        }

        // Adjacent-word match: all phrase words in order, side by side
        let phrase_words: Vec<&str> = self.phrase.split_whitespace().collect();
        if phrase_words.len() > 1 {
            let text_words: Vec<&str> = text.split_whitespace().collect();
            for window in text_words.windows(phrase_words.len()) {
                if window
                    .iter()
                    .zip(&phrase_words)
                    .all(|(w, p)| w.starts_with(p) || p.starts_with(w))
                {
                    return 0.9;
                }
            }
        }
        0.0
    }
}

impl super::WakeModel for PhraseSpotter {
    fn score(&mut self, frame: &[i16]) -> f32 {
        match self.stt.feed_frame(frame) {
            Ok(Some(text)) => {
                let score = self.score_transcript(&text);
                // Finalized text was consumed; start the next window fresh
                self.stt.reset();
                score
            }
            Ok(None) => 0.0,
            Err(e) => {
                warn!("[wake] spotter transcription failed: {e}");
                0.0
            }
        }
    }

    fn reset(&mut self) {
        self.stt.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::SttError;
    use crate::wakeword::WakeModel;

    /// Stream mock that finalizes a fixed transcript on every frame.
    struct EchoStream(Option<String>);

    impl StreamingTranscriber for EchoStream {
        fn feed_frame(&mut self, _frame: &[i16]) -> Result<Option<String>, SttError> {
            Ok(self.0.clone())
        }

        fn reset(&mut self) {}
    }

    fn spotter(transcript: Option<&str>) -> PhraseSpotter {
        PhraseSpotter::new(
            Box::new(EchoStream(transcript.map(str::to_string))),
            "джарвис",
        )
    }

    #[test]
    fn test_exact_phrase_scores_one() {
        let mut s = spotter(Some("джарвис включи музыку"));
        assert_eq!(s.score(&[0; 512]), 1.0);
    }

    #[test]
    fn test_case_insensitive() {
        let mut s = spotter(Some("ДЖАРВИС"));
        assert_eq!(s.score(&[0; 512]), 1.0);
    }

    #[test]
    fn test_unrelated_text_scores_zero() {
        let mut s = spotter(Some("какая сегодня погода"));
        assert_eq!(s.score(&[0; 512]), 0.0);
    }

    #[test]
    fn test_open_recognition_scores_zero() {
        let mut s = spotter(None);
        assert_eq!(s.score(&[0; 512]), 0.0);
    }

    #[test]
    fn test_multiword_phrase_variants() {
        let mut joined = PhraseSpotter::new(
            Box::new(EchoStream(Some("окейдом свет".to_string()))),
            "окей дом",
        );
        assert_eq!(joined.score(&[0; 512]), 0.95);

        let mut hyphen = PhraseSpotter::new(
            Box::new(EchoStream(Some("окей-дом".to_string()))),
            "окей дом",
        );
        assert_eq!(hyphen.score(&[0; 512]), 0.95);
    }

    #[test]
    fn test_transcription_error_scores_zero() {
        struct FailingStream;
        impl StreamingTranscriber for FailingStream {
            fn feed_frame(&mut self, _frame: &[i16]) -> Result<Option<String>, SttError> {
                Err(SttError::TranscriptionFailed("model gone".into()))
            }
            fn reset(&mut self) {}
        }
        let mut s = PhraseSpotter::new(Box::new(FailingStream), "джарвис");
        assert_eq!(s.score(&[0; 512]), 0.0);
    }
}
