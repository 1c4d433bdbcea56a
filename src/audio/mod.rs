// Audio subsystem: synchronized dual-source capture and the per-frame
// signal chain (echo cancellation, noise suppression, voice activity).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use thiserror::Error;

pub mod aec;
pub use aec::EchoCanceller;

pub mod capture;
pub use capture::{AudioCapture, CaptureConfig};

pub mod noise;
pub use noise::{NoiseModel, NoiseSuppressor, Passthrough, SpectralGate};

pub mod vad;
pub use vad::{SpeechDetector, VoiceActivityDetector};

pub mod wav;
pub use wav::write_utterance;

/// Nominal sample rate for the whole pipeline (speech models expect 16 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Nominal frame size in samples (32 ms at 16 kHz)
pub const DEFAULT_FRAME_SIZE: usize = 512;

/// Errors that can occur while opening or running audio capture
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable input device was found
    #[error("no {0} device available")]
    NoDevice(&'static str),
    /// Device refused its configuration
    #[error("audio device error: {0}")]
    Device(String),
    /// Stream could not be built or started
    #[error("audio stream error: {0}")]
    Stream(String),
    /// Capture was started twice without an intervening stop
    #[error("capture already running")]
    AlreadyRunning,
}

/// One synchronized capture unit: a microphone frame and the
/// time-matched frame of whatever the system was playing back.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono signed-16 samples at the nominal rate
    pub mic: Vec<i16>,
    /// Loopback samples, downmixed and resampled to match `mic`
    pub loopback: Vec<i16>,
    /// Monotonic time at which the synchronizer emitted the frame
    pub timestamp: Instant,
}

impl AudioFrame {
    /// Both channels must carry exactly `frame_size` samples.
    pub fn new(mic: Vec<i16>, loopback: Vec<i16>) -> Self {
        debug_assert_eq!(mic.len(), loopback.len());
        Self {
            mic,
            loopback,
            timestamp: Instant::now(),
        }
    }
}

/// Root-mean-square energy of a sample block. Returns 0.0 for empty input.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Bounded FIFO of frames with discard-oldest backpressure.
///
/// Single producer (a reader thread), single consumer (the synchronizer);
/// callers wrap it in a mutex.
pub struct FrameRing {
    frames: VecDeque<Vec<i16>>,
    capacity: usize,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Capacity for `buffer_seconds` worth of frames.
    pub fn for_duration(buffer_seconds: f32, sample_rate: u32, frame_size: usize) -> Self {
        let capacity =
            ((buffer_seconds * sample_rate as f32) / frame_size as f32).ceil() as usize;
        Self::new(capacity)
    }

    /// Append a frame, silently dropping the oldest unread one when full.
    pub fn push(&mut self, frame: Vec<i16>) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn pop(&mut self) -> Option<Vec<i16>> {
        self.frames.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Source of synchronized frames, as seen by the orchestrator.
///
/// `AudioCapture` is the production implementation; tests drive the state
/// machine from scripted sources.
pub trait FrameSource: Send {
    fn start(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self);
    /// Next frame in synchronizer-emission order, or `None` once `timeout`
    /// elapses with nothing available. Underrun is not an error.
    fn read_frame(&mut self, timeout: Duration) -> Option<AudioFrame>;
}
