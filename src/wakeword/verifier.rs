// Wake word verification: reject detections that came out of our own
// speakers. Uses raw (pre-AEC) energies on purpose; echo cancellation
// would erase exactly the signal this check relies on.

/// Guards the energy-ratio division against a silent loopback
const ENERGY_EPS: f32 = 1e-10;

/// Verify a wake word came from a person in the room, not from the
/// system's own playback.
#[derive(Debug, Clone)]
pub struct WakeWordVerifier {
    energy_ratio_threshold: f32,
    confidence_threshold: f32,
}

impl WakeWordVerifier {
    pub fn new(energy_ratio_threshold: f32, confidence_threshold: f32) -> Self {
        Self {
            energy_ratio_threshold,
            confidence_threshold,
        }
    }

    /// Accept when the detector is confident and the mic is carrying
    /// meaningfully more energy than the loopback. Similar energies mean
    /// the sound is most likely the speakers echoing back.
    pub fn verify(&self, mic_energy: f32, loopback_energy: f32, confidence: f32) -> bool {
        let energy_ratio = mic_energy / (loopback_energy + ENERGY_EPS);
        confidence >= self.confidence_threshold && energy_ratio >= self.energy_ratio_threshold
    }
}

impl Default for WakeWordVerifier {
    fn default() -> Self {
        Self::new(1.5, 0.8)
    }
}
