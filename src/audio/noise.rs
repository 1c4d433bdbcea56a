// Stationary noise suppression.
//
// The suppressor owns the int16/float boundary; the actual enhancement
// is behind the NoiseModel trait so the backend can be swapped (or
// disabled) without touching callers. The built-in backend is a
// spectral gate with a per-bin minima-tracking noise floor.

use std::collections::HashMap;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Scale between i16 samples and the model's [-1, 1] domain
const SCALE: f32 = 32768.0;

/// A noise-reduction backend operating in the float domain.
pub trait NoiseModel: Send {
    /// Enhance one frame in place.
    fn enhance(&mut self, frame: &mut [f32]);
}

/// Identity backend, used when suppression is disabled and by tests.
#[derive(Debug, Default)]
pub struct Passthrough;

impl NoiseModel for Passthrough {
    fn enhance(&mut self, _frame: &mut [f32]) {}
}

/// Spectral gate: tracks a slowly-rising per-bin noise floor and
/// attenuates bins that do not clear it.
pub struct SpectralGate {
    planner: FftPlanner<f32>,
    plans: HashMap<usize, (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>)>,
    /// Per-bin noise floor estimate; tracks the current frame length
    floor: Vec<f32>,
    /// How much of the floor is subtracted from each bin
    oversubtraction: f32,
    /// Gain applied to bins below the floor
    min_gain: f32,
    /// Upward floor adaptation rate per frame
    rise: f32,
}

impl SpectralGate {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            floor: Vec::new(),
            oversubtraction: 1.5,
            min_gain: 0.1,
            rise: 0.02,
        }
    }

    fn plans_for(&mut self, len: usize) -> (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>) {
        let planner = &mut self.planner;
        self.plans
            .entry(len)
            .or_insert_with(|| {
                (
                    planner.plan_fft_forward(len),
                    planner.plan_fft_inverse(len),
                )
            })
            .clone()
    }
}

impl Default for SpectralGate {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseModel for SpectralGate {
    fn enhance(&mut self, frame: &mut [f32]) {
        let len = frame.len();
        if len == 0 {
            return;
        }
        let (forward, inverse) = self.plans_for(len);

        let mut spectrum: Vec<Complex<f32>> =
            frame.iter().map(|&s| Complex::new(s, 0.0)).collect();
        forward.process(&mut spectrum);

        if self.floor.len() != len {
            // First frame at this length seeds the floor estimate
            self.floor = spectrum.iter().map(|c| c.norm()).collect();
        }

        for (bin, floor) in spectrum.iter_mut().zip(self.floor.iter_mut()) {
            let magnitude = bin.norm();

            // Minima tracking: drop to new minima immediately, creep up
            if magnitude < *floor {
                *floor = magnitude;
            } else {
                *floor += self.rise * (magnitude - *floor);
            }

            let gain = if magnitude > f32::EPSILON {
                ((magnitude - self.oversubtraction * *floor) / magnitude)
                    .clamp(self.min_gain, 1.0)
            } else {
                self.min_gain
            };
            *bin *= gain;
        }

        inverse.process(&mut spectrum);
        let norm = 1.0 / len as f32;
        for (out, bin) in frame.iter_mut().zip(&spectrum) {
            *out = bin.re * norm;
        }
    }
}

/// Noise suppressor: int16 in, int16 out, same shape.
pub struct NoiseSuppressor {
    model: Box<dyn NoiseModel>,
}

impl NoiseSuppressor {
    pub fn new(model: Box<dyn NoiseModel>) -> Self {
        Self { model }
    }

    /// Suppressor with the built-in spectral gate backend.
    pub fn spectral() -> Self {
        Self::new(Box::new(SpectralGate::new()))
    }

    /// Suppressor that passes audio through unchanged.
    pub fn passthrough() -> Self {
        Self::new(Box::new(Passthrough))
    }

    /// Suppress noise in one frame, returning a frame of the same shape.
    pub fn process(&mut self, frame: &[i16]) -> Vec<i16> {
        let mut floats: Vec<f32> = frame.iter().map(|&s| s as f32 / SCALE).collect();
        self.model.enhance(&mut floats);
        floats
            .into_iter()
            .map(|s| (s * SCALE).round().clamp(-32768.0, 32767.0) as i16)
            .collect()
    }
}
