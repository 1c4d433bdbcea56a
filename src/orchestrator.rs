// Orchestrator: the state machine connecting capture, the per-frame
// signal chain, wake detection, transcription, intent routing and the
// effectors.
//
// All mutable session state (speech buffer, silence counter, saved
// volume, pending intent) lives here, owned by the single orchestrator
// task. Subsystems own nothing but their internal model state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task;

use crate::audio::{
    rms, AudioFrame, CaptureError, EchoCanceller, FrameSource, NoiseSuppressor, SpeechDetector,
};
use crate::control::Effector;
use crate::feedback::SoundCue;
use crate::intents::{FallbackRouter, Intent, IntentKind, RegexIntentRouter};
use crate::media::{MediaManager, PlayOutcome};
use crate::stt::{SttRouter, TranscriptionContext};
use crate::wakeword::{WakeWordDetector, WakeWordVerifier};
use crate::{debug, info, warn};

/// Consecutive non-speech frames that end an utterance
pub const SILENCE_THRESHOLD: usize = 8;

/// Replies that confirm a pending destructive action. Anything else,
/// including «нет», rejects it.
const CONFIRMATION_TOKENS: [&str; 3] = ["да", "подтверждаю", "выключай"];

/// Frame read poll interval of the main loop
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Orchestrator states. `Processing` and `Responding` are transient;
/// the steady states are `Idle`, `Listening` and `Confirming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Listening,
    Processing,
    Responding,
    Confirming,
}

/// Everything the orchestrator drives, bundled so wiring sites and
/// tests read the same way.
pub struct Components {
    pub capture: Box<dyn FrameSource>,
    pub aec: EchoCanceller,
    pub noise: NoiseSuppressor,
    pub vad: Box<dyn SpeechDetector>,
    pub wake_word: WakeWordDetector,
    pub wake_verifier: WakeWordVerifier,
    pub stt_router: SttRouter,
    pub intent_router: RegexIntentRouter,
    pub llm_fallback: Box<dyn FallbackRouter>,
    pub media: MediaManager,
    pub feedback: Box<dyn SoundCue>,
    pub effector: Box<dyn Effector>,
}

/// Tuning knobs lifted from the configuration.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub max_listen_seconds: f32,
    pub frame_size: usize,
    pub sample_rate: u32,
    pub auto_mute_factor: f32,
    /// When set, completed utterances are dumped here as WAV files
    pub dump_dir: Option<PathBuf>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_listen_seconds: 5.0,
            frame_size: 512,
            sample_rate: 16_000,
            auto_mute_factor: 0.1,
            dump_dir: None,
        }
    }
}

pub struct Orchestrator {
    state: State,

    capture: Box<dyn FrameSource>,
    aec: EchoCanceller,
    noise: NoiseSuppressor,
    vad: Box<dyn SpeechDetector>,
    wake_word: WakeWordDetector,
    wake_verifier: WakeWordVerifier,
    stt_router: SttRouter,
    intent_router: RegexIntentRouter,
    llm_fallback: Box<dyn FallbackRouter>,
    media: MediaManager,
    feedback: Box<dyn SoundCue>,
    effector: Box<dyn Effector>,

    tuning: Tuning,

    /// Volume recorded at wake time, restored on return to Idle.
    /// Non-null exactly while a muted sub-session is open.
    saved_volume: Option<f32>,
    /// Post-processed frames gathered during Listening or Confirming
    speech_buffer: Vec<Vec<i16>>,
    /// Consecutive non-speech frames seen so far
    silence_frames: usize,
    /// Held while state == Confirming, only Shutdown or Reboot
    pending_intent: Option<Intent>,
}

impl Orchestrator {
    pub fn new(components: Components, tuning: Tuning) -> Self {
        Self {
            state: State::Idle,
            capture: components.capture,
            aec: components.aec,
            noise: components.noise,
            vad: components.vad,
            wake_word: components.wake_word,
            wake_verifier: components.wake_verifier,
            stt_router: components.stt_router,
            intent_router: components.intent_router,
            llm_fallback: components.llm_fallback,
            media: components.media,
            feedback: components.feedback,
            effector: components.effector,
            tuning,
            saved_volume: None,
            speech_buffer: Vec::new(),
            silence_frames: 0,
            pending_intent: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Main event loop: pull frames until the running flag drops, then
    /// release the capture device no matter how the loop ended.
    pub async fn run(&mut self, running: Arc<AtomicBool>) -> Result<(), CaptureError> {
        self.capture.start()?;
        info!("[orchestrator] capture started, entering main loop");
        while running.load(Ordering::SeqCst) {
            let frame = task::block_in_place(|| self.capture.read_frame(READ_TIMEOUT));
            if let Some(frame) = frame {
                self.process_frame(frame).await;
            }
        }
        self.capture.stop();
        info!("[orchestrator] stopped");
        Ok(())
    }

    /// Per-frame pipeline: AEC, then noise suppression, then the
    /// state-dependent handler. Strictly sequential within a frame.
    pub async fn process_frame(&mut self, frame: AudioFrame) {
        let cancelled = self.aec.process(&frame.mic, &frame.loopback);
        let clean = self.noise.process(&cancelled);

        match self.state {
            State::Idle => self.handle_idle(&clean, &frame).await,
            State::Listening => self.handle_listening(clean).await,
            State::Confirming => self.handle_confirming(clean).await,
            // Transient states never survive across frames
            State::Processing | State::Responding => {}
        }
    }

    async fn handle_idle(&mut self, clean: &[i16], frame: &AudioFrame) {
        let confidence = self.wake_word.process_frame(clean);

        // The verifier wants the raw acoustic picture: AEC would erase
        // exactly the speaker leakage it is looking for
        let mic_energy = rms(&frame.mic);
        let loopback_energy = rms(&frame.loopback);

        if self
            .wake_verifier
            .verify(mic_energy, loopback_energy, confidence)
        {
            info!(
                "[orchestrator] wake accepted: confidence={confidence:.2} mic={mic_energy:.0} loopback={loopback_energy:.0}"
            );
            self.feedback.play_wake();
            self.auto_mute();
            self.state = State::Listening;
            self.speech_buffer.clear();
            self.silence_frames = 0;
        }
    }

    async fn handle_listening(&mut self, clean: Vec<i16>) {
        if self.vad.is_speech(&clean) {
            self.silence_frames = 0;
        } else {
            self.silence_frames += 1;
        }
        self.speech_buffer.push(clean);

        let total_seconds = (self.speech_buffer.len() * self.tuning.frame_size) as f32
            / self.tuning.sample_rate as f32;
        if self.silence_frames > SILENCE_THRESHOLD
            || total_seconds > self.tuning.max_listen_seconds
        {
            self.state = State::Processing;
            let audio = self.take_utterance();
            let text = task::block_in_place(|| {
                self.stt_router
                    .transcribe(&audio, TranscriptionContext::General)
            });
            debug!("[orchestrator] transcript: {text:?}");
            self.route_intent(&text).await;
        }
    }

    async fn handle_confirming(&mut self, clean: Vec<i16>) {
        if self.vad.is_speech(&clean) {
            self.silence_frames = 0;
        } else {
            self.silence_frames += 1;
        }
        self.speech_buffer.push(clean);

        if self.silence_frames > SILENCE_THRESHOLD {
            let audio = self.take_utterance();
            let text = task::block_in_place(|| {
                self.stt_router
                    .transcribe(&audio, TranscriptionContext::Confirmation)
            });
            let reply = text.trim().to_lowercase();

            if CONFIRMATION_TOKENS.contains(&reply.as_str()) {
                info!("[orchestrator] confirmed: {reply:?}");
                self.execute_confirmed();
            } else {
                info!("[orchestrator] confirmation rejected: {reply:?}");
            }
            self.enter_idle();
        }
    }

    async fn route_intent(&mut self, text: &str) {
        self.feedback.play_searching();
        let mut intent = self.intent_router.route(text);

        if intent.kind == IntentKind::Unknown && self.llm_fallback.is_available().await {
            debug!("[orchestrator] pattern miss, consulting LLM fallback");
            intent = self.llm_fallback.route(text).await;
        }

        self.state = State::Responding;
        self.execute_intent(intent).await;

        // Return to Idle unless the intent opened a confirmation dialog
        if self.state != State::Confirming {
            self.enter_idle();
        }
    }

    async fn execute_intent(&mut self, intent: Intent) {
        debug!("[orchestrator] executing {:?}", intent.kind);
        match intent.kind {
            IntentKind::PlayMedia => {
                let outcome = task::block_in_place(|| self.media.play(&intent.query));
                match outcome {
                    PlayOutcome::Status(message) => info!("[media] {message}"),
                    PlayOutcome::Ambiguous(results) => info!(
                        "[media] {} candidates for {:?}, playing none",
                        results.len(),
                        intent.query
                    ),
                }
            }
            IntentKind::Pause => {
                let message = task::block_in_place(|| self.media.pause());
                info!("[media] {message}");
            }
            IntentKind::Resume => {
                let message = task::block_in_place(|| self.media.resume());
                info!("[media] {message}");
            }
            IntentKind::Fullscreen => {
                let message = task::block_in_place(|| self.media.fullscreen());
                info!("[media] {message}");
            }
            IntentKind::VolumeSet => match intent.level() {
                Some(level) => {
                    let level = level.clamp(0, 100) as u8;
                    if let Err(e) = self.effector.volume_set(level) {
                        warn!("[orchestrator] volume set failed: {e}");
                    }
                }
                None => warn!("[orchestrator] volume_set intent without a level"),
            },
            IntentKind::VolumeUp => self.nudge_volume(10),
            IntentKind::VolumeDown => self.nudge_volume(-10),
            IntentKind::NextTrack => {
                if let Err(e) = self.effector.next_track() {
                    warn!("[orchestrator] next track failed: {e}");
                }
            }
            IntentKind::PrevTrack => {
                if let Err(e) = self.effector.prev_track() {
                    warn!("[orchestrator] previous track failed: {e}");
                }
            }
            IntentKind::Shutdown | IntentKind::Reboot => {
                info!("[orchestrator] {:?} held for confirmation", intent.kind);
                self.pending_intent = Some(intent);
                self.speech_buffer.clear();
                self.silence_frames = 0;
                self.state = State::Confirming;
            }
            // Reserved: window close needs a target-window protocol
            IntentKind::Close => {}
            IntentKind::Unknown => {
                info!("[orchestrator] unrecognized command: {:?}", intent.query);
                self.feedback.play_error();
            }
        }
    }

    /// Run the confirmed destructive action, if one is pending.
    fn execute_confirmed(&mut self) {
        let Some(intent) = self.pending_intent.take() else {
            return;
        };
        let result = match intent.kind {
            IntentKind::Shutdown => self.effector.shutdown(),
            IntentKind::Reboot => self.effector.reboot(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("[orchestrator] power command failed: {e}");
        }
    }

    /// Adjust volume relative to the current level, rounded and clamped
    /// to 0..=100.
    fn nudge_volume(&mut self, delta: i32) {
        match self.effector.volume_get() {
            Ok(current) => {
                let level = ((current * 100.0).round() as i32 + delta).clamp(0, 100) as u8;
                if let Err(e) = self.effector.volume_set(level) {
                    warn!("[orchestrator] volume adjust failed: {e}");
                }
            }
            Err(e) => warn!("[orchestrator] volume read failed: {e}"),
        }
    }

    /// Concatenate and clear the speech buffer, dumping it to disk when
    /// configured.
    fn take_utterance(&mut self) -> Vec<i16> {
        let audio = self.speech_buffer.concat();
        self.speech_buffer.clear();
        if let Some(dir) = &self.tuning.dump_dir {
            match crate::audio::write_utterance(dir, &audio, self.tuning.sample_rate) {
                Ok(path) => debug!("[orchestrator] utterance dumped to {}", path.display()),
                Err(e) => warn!("[orchestrator] utterance dump failed: {e}"),
            }
        }
        audio
    }

    /// The single road back to Idle: restore volume, drop buffered
    /// speech and any pending intent.
    fn enter_idle(&mut self) {
        self.auto_unmute();
        self.speech_buffer.clear();
        self.silence_frames = 0;
        self.pending_intent = None;
        self.state = State::Idle;
    }

    /// Duck playback to a fraction of the current volume so the
    /// utterance is not drowned out. Volume I/O failures are swallowed.
    fn auto_mute(&mut self) {
        match self.effector.volume_get() {
            Ok(volume) => {
                self.saved_volume = Some(volume);
                let ducked = (volume * 100.0 * self.tuning.auto_mute_factor).round() as u8;
                if let Err(e) = self.effector.volume_set(ducked) {
                    warn!("[orchestrator] auto-mute failed: {e}");
                }
            }
            Err(e) => warn!("[orchestrator] volume read failed, skipping auto-mute: {e}"),
        }
    }

    fn auto_unmute(&mut self) {
        if let Some(volume) = self.saved_volume.take() {
            let restored = (volume * 100.0).round() as u8;
            if let Err(e) = self.effector.volume_set(restored) {
                warn!("[orchestrator] auto-unmute failed: {e}");
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
