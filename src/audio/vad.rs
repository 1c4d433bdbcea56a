// Voice activity detection backed by the Silero VAD model.

use thiserror::Error;
use voice_activity_detector::VoiceActivityDetector as Silero;

use crate::{trace, warn};

/// Default speech probability threshold.
///
/// 0.5 favors precision: utterance segmentation must not cut speech off
/// during soft passages, so only confident frames count as speech.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VadError {
    #[error("VAD initialization failed: {0}")]
    InitializationFailed(String),
    #[error("VAD configuration invalid: {0}")]
    ConfigurationInvalid(String),
}

/// Per-frame speech/non-speech decision, as seen by the orchestrator.
pub trait SpeechDetector: Send {
    fn is_speech(&mut self, frame: &[i16]) -> bool;
    /// Clear any running model state between utterances.
    fn reset(&mut self);
}

/// Silero-based detector. The model carries LSTM state across frames,
/// which `reset` clears by rebuilding it.
pub struct VoiceActivityDetector {
    model: Silero,
    threshold: f32,
    sample_rate: u32,
    chunk_size: usize,
}

/// Model window: 32 ms of audio (256 samples at 8 kHz, 512 at 16 kHz).
fn chunk_size_for_sample_rate(sample_rate: u32) -> usize {
    (sample_rate / 1000 * 32) as usize
}

fn build_model(sample_rate: u32, chunk_size: usize) -> Result<Silero, VadError> {
    Silero::builder()
        .sample_rate(sample_rate as i32)
        .chunk_size(chunk_size)
        .build()
        .map_err(|e| VadError::InitializationFailed(e.to_string()))
}

impl VoiceActivityDetector {
    pub fn new(sample_rate: u32, threshold: f32) -> Result<Self, VadError> {
        match sample_rate {
            8000 | 16000 => {}
            other => {
                return Err(VadError::ConfigurationInvalid(format!(
                    "unsupported sample rate: {} Hz, must be 8000 or 16000",
                    other
                )))
            }
        }
        let chunk_size = chunk_size_for_sample_rate(sample_rate);
        Ok(Self {
            model: build_model(sample_rate, chunk_size)?,
            threshold,
            sample_rate,
            chunk_size,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl SpeechDetector for VoiceActivityDetector {
    fn is_speech(&mut self, frame: &[i16]) -> bool {
        // The model wants exactly one window of samples
        let probability = if frame.len() == self.chunk_size {
            self.model.predict(frame.to_vec())
        } else {
            let mut window = frame.to_vec();
            window.resize(self.chunk_size, 0);
            self.model.predict(window)
        };
        trace!(
            "[vad] probability={probability:.3} threshold={:.3}",
            self.threshold
        );
        probability > self.threshold
    }

    fn reset(&mut self) {
        match build_model(self.sample_rate, self.chunk_size) {
            Ok(model) => self.model = model,
            Err(e) => warn!("[vad] reset failed, keeping previous state: {e}"),
        }
    }
}
