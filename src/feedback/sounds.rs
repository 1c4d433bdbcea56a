// Short sine-wave cues marking state transitions: wake, searching,
// error. Playback is fire-and-forget; a machine without an output
// device just stays silent.

use std::sync::Arc;
use std::thread;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use crate::warn;

/// Cue playback as seen by the orchestrator.
pub trait SoundCue: Send {
    /// Short high beep: wake word accepted.
    fn play_wake(&self);
    /// Mid beep: command understood, acting on it.
    fn play_searching(&self);
    /// Low beep: the command went nowhere.
    fn play_error(&self);
}

pub struct SoundFeedback {
    sample_rate: u32,
    wake: Arc<Vec<i16>>,
    confirm: Arc<Vec<i16>>,
    error: Arc<Vec<i16>>,
}

impl SoundFeedback {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            wake: Arc::new(synth_beep(sample_rate, 880.0, 0.05)),
            confirm: Arc::new(synth_beep(sample_rate, 440.0, 0.1)),
            error: Arc::new(synth_beep(sample_rate, 220.0, 0.2)),
        }
    }

    /// Play a pre-synthesized cue on a detached thread. Best-effort:
    /// device failures are logged and swallowed.
    fn play(&self, samples: Arc<Vec<i16>>) {
        let sample_rate = self.sample_rate;
        thread::spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("[feedback] no output device: {e}");
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(e) => {
                    warn!("[feedback] sink creation failed: {e}");
                    return;
                }
            };
            sink.append(SamplesBuffer::new(1, sample_rate, samples.as_slice().to_vec()));
            sink.sleep_until_end();
        });
    }
}

impl SoundCue for SoundFeedback {
    fn play_wake(&self) {
        self.play(Arc::clone(&self.wake));
    }

    fn play_searching(&self) {
        self.play(Arc::clone(&self.confirm));
    }

    fn play_error(&self) {
        self.play(Arc::clone(&self.error));
    }
}

/// Synthesize a sine tone: sample i is sin(2π·freq·i/rate)·0.5·32767.
fn synth_beep(sample_rate: u32, freq: f32, duration: f32) -> Vec<i16> {
    let count = (sample_rate as f32 * duration) as usize;
    (0..count)
        .map(|i| {
            (f32::sin(2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32)
                * 0.5
                * 32767.0) as i16
        })
        .collect()
}
