// Per-frame wake word scoring over one or more loaded models.

use crate::trace;

/// A wake word scoring backend.
pub trait WakeModel: Send {
    /// Confidence in [0, 1] that the wake word is present in this frame.
    fn score(&mut self, frame: &[i16]) -> f32;
    /// Clear any running state.
    fn reset(&mut self);
}

/// Detector that fans each frame out to all loaded models and keeps
/// the best score.
pub struct WakeWordDetector {
    models: Vec<Box<dyn WakeModel>>,
    threshold: f32,
}

impl WakeWordDetector {
    pub fn new(models: Vec<Box<dyn WakeModel>>, threshold: f32) -> Self {
        Self { models, threshold }
    }

    /// Highest confidence across all models for this frame.
    pub fn process_frame(&mut self, frame: &[i16]) -> f32 {
        let confidence = self
            .models
            .iter_mut()
            .map(|m| m.score(frame))
            .fold(0.0f32, f32::max);
        trace!("[wake] confidence={confidence:.3}");
        confidence
    }

    /// True when any model clears the threshold (inclusive).
    pub fn detected(&mut self, frame: &[i16]) -> bool {
        self.process_frame(frame) >= self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        for model in &mut self.models {
            model.reset();
        }
    }
}
