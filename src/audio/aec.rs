// Acoustic echo cancellation with a normalized LMS adaptive filter.
//
// The loopback signal is the reference; whatever of it leaks back in
// through the speakers is estimated by the filter and subtracted from
// the microphone signal. With a silent reference the filter output is
// zero and the mic signal passes through untouched.

use crate::trace;

/// Sub-frame granularity fed to the adaptive filter
pub const DEFAULT_SUB_FRAME: usize = 160;

/// NLMS adaptation step size
const STEP_SIZE: f32 = 0.5;

/// Regularization added to the reference power before dividing
const POWER_EPS: f32 = 1e-6;

/// Scale between i16 samples and the filter's [-1, 1] domain
const SCALE: f32 = 32768.0;

pub struct EchoCanceller {
    sub_frame_size: usize,
    /// Filter taps, newest reference sample first
    weights: Vec<f32>,
    /// Reference delay line, same layout as `weights`
    history: Vec<f32>,
    /// Running sum of squares over `history`
    power: f32,
}

impl EchoCanceller {
    pub fn new(filter_length: usize, sub_frame_size: usize) -> Self {
        Self {
            sub_frame_size: sub_frame_size.max(1),
            weights: vec![0.0; filter_length],
            history: vec![0.0; filter_length],
            power: 0.0,
        }
    }

    /// A canceller with no taps, which passes the mic signal through
    /// bitwise. Used when echo cancellation is disabled in the config.
    pub fn disabled() -> Self {
        Self::new(0, DEFAULT_SUB_FRAME)
    }

    /// Remove the reference signal's contribution from `mic`.
    ///
    /// Inputs are sliced into `sub_frame_size` chunks (the last may be
    /// shorter) and run through the filter in order. The output always
    /// has exactly `mic.len()` samples. A missing tail of `reference`
    /// is treated as silence.
    pub fn process(&mut self, mic: &[i16], reference: &[i16]) -> Vec<i16> {
        let mut output = Vec::with_capacity(mic.len());
        let mut pos = 0;
        while pos < mic.len() {
            let end = (pos + self.sub_frame_size).min(mic.len());
            for i in pos..end {
                let desired = mic[i] as f32 / SCALE;
                let x = reference.get(i).copied().unwrap_or(0) as f32 / SCALE;
                let clean = self.cancel_sample(desired, x);
                output.push((clean * SCALE).round().clamp(-32768.0, 32767.0) as i16);
            }
            pos = end;
        }
        output
    }

    /// Discard all adaptation state.
    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.history.fill(0.0);
        self.power = 0.0;
        trace!("[aec] filter state reset");
    }

    /// One NLMS step: predict the echo from the reference history,
    /// subtract it, and nudge the taps toward the residual.
    fn cancel_sample(&mut self, desired: f32, x: f32) -> f32 {
        let taps = self.weights.len();
        if taps == 0 {
            return desired;
        }

        let dropped = self.history[taps - 1];
        self.history.copy_within(..taps - 1, 1);
        self.history[0] = x;
        self.power += x * x - dropped * dropped;
        if self.power < 0.0 {
            self.power = 0.0;
        }

        let mut estimate = 0.0f32;
        for (w, h) in self.weights.iter().zip(&self.history) {
            estimate += w * h;
        }
        let error = desired - estimate;

        let gain = STEP_SIZE * error / (self.power + POWER_EPS);
        for (w, h) in self.weights.iter_mut().zip(&self.history) {
            *w += gain * h;
        }
        error
    }
}
