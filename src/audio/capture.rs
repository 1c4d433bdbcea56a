// Synchronized dual-source capture: microphone plus system loopback.
//
// cpal streams are not Send, so each stream lives on a dedicated reader
// thread and hands samples out through lock-free SPSC ring buffers. A
// third thread pairs time-matched frames from the two sides.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapProd, HeapRb,
};

use super::{AudioFrame, CaptureError, FrameRing, FrameSource};
use crate::{trace, warn};

/// How long `start` waits for both streams to come up
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader poll interval when a ring has too few samples
const READER_IDLE: Duration = Duration::from_millis(1);

/// Capture parameters, taken from the audio section of the config
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    /// Microphone device name; `None` selects the host default
    pub mic_device: Option<String>,
    /// Depth of the per-side frame buffers, in seconds of audio
    pub buffer_seconds: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: super::DEFAULT_SAMPLE_RATE,
            frame_size: super::DEFAULT_FRAME_SIZE,
            mic_device: None,
            buffer_seconds: 2.0,
        }
    }
}

/// Captures microphone input and system loopback simultaneously.
pub struct AudioCapture {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    frame_rx: Option<Receiver<AudioFrame>>,
    threads: Vec<JoinHandle<()>>,
}

impl AudioCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            frame_rx: None,
            threads: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_readers(&mut self) -> Result<(), CaptureError> {
        let mic_ring = Arc::new(Mutex::new(FrameRing::for_duration(
            self.config.buffer_seconds,
            self.config.sample_rate,
            self.config.frame_size,
        )));
        let loopback_ring = Arc::new(Mutex::new(FrameRing::for_duration(
            self.config.buffer_seconds,
            self.config.sample_rate,
            self.config.frame_size,
        )));

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();

        // Mic reader owns the mic stream
        {
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            let ring = Arc::clone(&mic_ring);
            let ready = ready_tx.clone();
            self.threads.push(
                thread::Builder::new()
                    .name("mic-reader".into())
                    .spawn(move || mic_reader(config, running, ring, ready))
                    .map_err(|e| CaptureError::Stream(e.to_string()))?,
            );
        }

        // Loopback reader owns the loopback stream
        {
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            let ring = Arc::clone(&loopback_ring);
            self.threads.push(
                thread::Builder::new()
                    .name("loopback-reader".into())
                    .spawn(move || loopback_reader(config, running, ring, ready_tx))
                    .map_err(|e| CaptureError::Stream(e.to_string()))?,
            );
        }

        // Both streams must come up before capture counts as started
        for _ in 0..2 {
            match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(CaptureError::Stream("stream startup timed out".into())),
            }
        }

        // Synchronizer pairs one frame from each side, FIFO
        let (frame_tx, frame_rx) = mpsc::channel();
        {
            let running = Arc::clone(&self.running);
            self.threads.push(
                thread::Builder::new()
                    .name("frame-sync".into())
                    .spawn(move || synchronizer(running, mic_ring, loopback_ring, frame_tx))
                    .map_err(|e| CaptureError::Stream(e.to_string()))?,
            );
        }
        self.frame_rx = Some(frame_rx);
        Ok(())
    }
}

impl FrameSource for AudioCapture {
    /// Open both streams and start the three capture threads.
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        if let Err(e) = self.spawn_readers() {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    /// Stop capture and join the reader threads.
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.frame_rx = None;
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Next synchronized frame, or `None` once the timeout elapses.
    fn read_frame(&mut self, timeout: Duration) -> Option<AudioFrame> {
        let rx = self.frame_rx.as_ref()?;
        match rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Mic reader thread: build the input stream, then assemble nominal-rate
/// frames out of the callback ring.
fn mic_reader(
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    ring: Arc<Mutex<FrameRing>>,
    ready: Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    let device = match find_mic_device(&host, config.mic_device.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let stream_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let rb = HeapRb::<i16>::new(config.sample_rate as usize);
    let (producer, mut consumer) = rb.split();

    let stream = match build_i16_stream(&device, &stream_config, producer) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::Stream(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    let mut frame = vec![0i16; config.frame_size];
    let mut filled = 0usize;
    while running.load(Ordering::SeqCst) {
        filled += consumer.pop_slice(&mut frame[filled..]);
        if filled == config.frame_size {
            ring.lock().push(std::mem::replace(
                &mut frame,
                vec![0i16; config.frame_size],
            ));
            filled = 0;
        } else {
            thread::sleep(READER_IDLE);
        }
    }
    drop(stream);
}

/// Loopback reader thread: open the playback-capture side in whatever
/// format the OS exposes, then fold each time-matched native block down
/// to one nominal-rate mono frame.
fn loopback_reader(
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    ring: Arc<Mutex<FrameRing>>,
    ready: Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    let device = match find_loopback_device(&host) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let native = match device
        .default_input_config()
        .or_else(|_| device.default_output_config())
    {
        Ok(c) => c,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::Device(e.to_string())));
            return;
        }
    };
    let native_rate = native.sample_rate().0;
    let channels = native.channels();
    let block =
        loopback_block_samples(config.frame_size, config.sample_rate, native_rate, channels);

    let rb = HeapRb::<i16>::new((native_rate as usize * channels as usize).max(block * 4));
    let (producer, mut consumer) = rb.split();

    let stream = match build_i16_stream(&device, &native.config(), producer) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::Stream(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    let mut raw = vec![0i16; block];
    let mut filled = 0usize;
    while running.load(Ordering::SeqCst) {
        filled += consumer.pop_slice(&mut raw[filled..]);
        if filled == block {
            let resampled = resample_to_frame(&raw, channels, config.frame_size);
            ring.lock().push(resampled);
            filled = 0;
        } else {
            thread::sleep(READER_IDLE);
        }
    }
    drop(stream);
}

/// Synchronizer thread: whenever both sides have a frame, emit one
/// `AudioFrame` stamped at the emission moment; otherwise yield briefly.
fn synchronizer(
    running: Arc<AtomicBool>,
    mic_ring: Arc<Mutex<FrameRing>>,
    loopback_ring: Arc<Mutex<FrameRing>>,
    frame_tx: Sender<AudioFrame>,
) {
    while running.load(Ordering::SeqCst) {
        let pair = {
            let mut mic = mic_ring.lock();
            let mut loopback = loopback_ring.lock();
            if !mic.is_empty() && !loopback.is_empty() {
                Some((mic.pop().unwrap(), loopback.pop().unwrap()))
            } else {
                None
            }
        };
        match pair {
            Some((mic, loopback)) => {
                if frame_tx.send(AudioFrame::new(mic, loopback)).is_err() {
                    break;
                }
            }
            None => thread::sleep(READER_IDLE),
        }
    }
    trace!("[capture] synchronizer exiting");
}

fn find_mic_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    if let Some(wanted) = name {
        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if device.name().map(|n| n == wanted).unwrap_or(false) {
                    return Ok(device);
                }
            }
        }
        warn!("[capture] mic device {wanted:?} not found, using default");
    }
    host.default_input_device()
        .ok_or(CaptureError::NoDevice("microphone"))
}

/// Prefer an explicit monitor/loopback input (PulseAudio and PipeWire
/// expose sink monitors as input devices); otherwise fall back to the
/// default output device, which WASAPI opens in loopback mode.
fn find_loopback_device(host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                let lower = name.to_lowercase();
                if lower.contains("monitor") || lower.contains("loopback") {
                    return Ok(device);
                }
            }
        }
    }
    host.default_output_device()
        .ok_or(CaptureError::NoDevice("loopback"))
}

/// Build an input stream that lands i16 samples in `producer` whatever
/// the device's native sample format is. Samples that do not fit are
/// dropped on the floor; the reader rings absorb normal jitter.
fn build_i16_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    producer: HeapProd<i16>,
) -> Result<cpal::Stream, CaptureError> {
    let format = device
        .default_input_config()
        .or_else(|_| device.default_output_config())
        .map_err(|e| CaptureError::Device(e.to_string()))?
        .sample_format();

    let err_fn = |err: cpal::StreamError| {
        warn!("[capture] stream error: {err}");
    };

    let mut producer = producer;
    let stream = match format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                producer.push_slice(data);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> =
                    data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                producer.push_slice(&converted);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                    .collect();
                producer.push_slice(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };
    stream.map_err(|e| CaptureError::Stream(e.to_string()))
}

/// Number of interleaved native samples that span the same wall-clock
/// time as one nominal frame.
pub(crate) fn loopback_block_samples(
    frame_size: usize,
    nominal_rate: u32,
    native_rate: u32,
    channels: u16,
) -> usize {
    let per_channel =
        (frame_size as f64 * native_rate as f64 / nominal_rate as f64).round() as usize;
    per_channel.max(1) * channels as usize
}

/// Downmix interleaved samples to mono by arithmetic mean, then linearly
/// interpolate to exactly `target_len` samples.
pub(crate) fn resample_to_frame(raw: &[i16], channels: u16, target_len: usize) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    let mono: Vec<f64> = raw
        .chunks(channels)
        .map(|group| group.iter().map(|&s| s as f64).sum::<f64>() / group.len() as f64)
        .collect();

    if mono.is_empty() {
        return vec![0; target_len];
    }
    if mono.len() == target_len {
        return mono.into_iter().map(|s| s as i16).collect();
    }

    let step = if target_len > 1 {
        (mono.len() - 1) as f64 / (target_len - 1) as f64
    } else {
        0.0
    };
    let mut out = Vec::with_capacity(target_len);
    for i in 0..target_len {
        let pos = i as f64 * step;
        let lower = pos.floor() as usize;
        let upper = (lower + 1).min(mono.len() - 1);
        let frac = pos - lower as f64;
        out.push((mono[lower] * (1.0 - frac) + mono[upper] * frac) as i16);
    }
    out
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod tests;
