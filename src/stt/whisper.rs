// Batch speech-to-text via whisper.cpp bindings.

use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{SttError, Transcriber};
use crate::info;

/// High-accuracy batch transcriber for complete utterances.
pub struct WhisperStt {
    context: WhisperContext,
    language: String,
}

impl WhisperStt {
    /// Load a ggml whisper model. `device` follows the config surface:
    /// anything other than "cpu" asks for GPU inference.
    pub fn load(model_path: &Path, language: &str, device: &str) -> Result<Self, SttError> {
        let path_str = model_path
            .to_str()
            .ok_or_else(|| SttError::ModelLoadFailed("invalid path encoding".to_string()))?;

        let mut params = WhisperContextParameters::default();
        params.use_gpu(device != "cpu");

        let context = WhisperContext::new_with_params(path_str, params)
            .map_err(|e| SttError::ModelLoadFailed(e.to_string()))?;
        info!("[stt] whisper model loaded from {path_str}");

        Ok(Self {
            context,
            language: language.to_string(),
        })
    }
}

impl Transcriber for WhisperStt {
    /// Transcribe a full utterance. Returns lowercased, trimmed text.
    fn transcribe(&mut self, audio: &[i16]) -> Result<String, SttError> {
        let samples: Vec<f32> = audio.iter().map(|&s| s as f32 / 32768.0).collect();

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.language));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self
            .context
            .create_state()
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
        state
            .full(params, &samples)
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;

        let mut transcription = String::new();
        for i in 0..state.full_n_segments() {
            if let Some(segment) = state.get_segment(i) {
                let text = segment
                    .to_str()
                    .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
                transcription.push_str(text);
                transcription.push(' ');
            }
        }

        Ok(transcription.trim().to_lowercase())
    }
}
