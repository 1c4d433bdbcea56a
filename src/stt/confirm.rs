// Streaming speech-to-text via the Parakeet end-of-utterance model.
// Tuned for short closed-vocabulary replies where latency matters more
// than accuracy.

use std::path::Path;

use parakeet_rs::ParakeetEOU;

use super::{StreamingTranscriber, SttError};
use crate::{debug, info};

/// Samples per model chunk (160 ms at 16 kHz)
pub const CHUNK_SIZE: usize = 2560;

pub struct EouStt {
    eou: ParakeetEOU,
    /// Samples waiting for a full chunk
    buffer: Vec<f32>,
    /// Text accumulated from intermediate chunks
    partial: String,
}

impl EouStt {
    pub fn load(model_dir: &Path) -> Result<Self, SttError> {
        let path_str = model_dir
            .to_str()
            .ok_or_else(|| SttError::ModelLoadFailed("invalid path encoding".to_string()))?;
        let eou = ParakeetEOU::from_pretrained(path_str, None)
            .map_err(|e| SttError::ModelLoadFailed(e.to_string()))?;
        info!("[stt] EOU model loaded from {path_str}");
        Ok(Self {
            eou,
            buffer: Vec::new(),
            partial: String::new(),
        })
    }

    /// Peak-normalize a chunk before inference.
    fn normalize(samples: &[f32]) -> Vec<f32> {
        let max_val = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let epsilon = 1e-10_f32;
        if max_val > epsilon {
            samples.iter().map(|s| s / (max_val + epsilon)).collect()
        } else {
            samples.to_vec()
        }
    }
}

impl StreamingTranscriber for EouStt {
    fn feed_frame(&mut self, frame: &[i16]) -> Result<Option<String>, SttError> {
        self.buffer
            .extend(frame.iter().map(|&s| s as f32 / 32768.0));

        let mut produced_text = false;
        while self.buffer.len() >= CHUNK_SIZE {
            let chunk: Vec<f32> = self.buffer.drain(..CHUNK_SIZE).collect();
            let normalized = Self::normalize(&chunk);
            let text = self
                .eou
                .transcribe(&normalized, false)
                .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
            if !text.is_empty() {
                self.partial.push_str(&text);
                produced_text = true;
            }
        }

        if !produced_text || self.partial.trim().is_empty() {
            return Ok(None);
        }

        // The model has recognized something: flush the remainder with
        // the end-of-utterance flag and hand back the finalized text.
        let tail: Vec<f32> = self.buffer.drain(..).collect();
        let normalized = Self::normalize(&tail);
        let text = self
            .eou
            .transcribe(&normalized, true)
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
        if !text.is_empty() {
            self.partial.push_str(&text);
        }

        let result = std::mem::take(&mut self.partial);
        debug!("[stt] EOU finalized: {result:?}");
        Ok(Some(result))
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.partial.clear();
    }
}
