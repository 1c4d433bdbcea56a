use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::control::EffectorError;
use crate::media::{MediaProvider, MediaResult};
use crate::stt::{StreamingTranscriber, SttError, Transcriber};

fn make_frame(mic_value: i16, loopback_value: i16) -> AudioFrame {
    AudioFrame::new(vec![mic_value; 512], vec![loopback_value; 512])
}

// ---------------------------------------------------------------- mocks

/// Frame source that records lifecycle calls and never yields frames.
struct NullSource {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FrameSource for NullSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.calls.lock().unwrap().push("start");
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push("stop");
    }

    fn read_frame(&mut self, _timeout: Duration) -> Option<AudioFrame> {
        None
    }
}

/// Wake model playing back a scripted score sequence, then 0.0.
struct ScriptedWake {
    script: VecDeque<f32>,
}

impl crate::wakeword::WakeModel for ScriptedWake {
    fn score(&mut self, _frame: &[i16]) -> f32 {
        self.script.pop_front().unwrap_or(0.0)
    }

    fn reset(&mut self) {}
}

/// VAD playing back scripted decisions, then "no speech".
struct ScriptedVad {
    script: VecDeque<bool>,
}

impl SpeechDetector for ScriptedVad {
    fn is_speech(&mut self, _frame: &[i16]) -> bool {
        self.script.pop_front().unwrap_or(false)
    }

    fn reset(&mut self) {}
}

struct FixedTranscriber(String);

impl Transcriber for FixedTranscriber {
    fn transcribe(&mut self, _audio: &[i16]) -> Result<String, SttError> {
        Ok(self.0.clone())
    }
}

/// Streaming backend that finalizes the configured reply on the first
/// chunk (or never finalizes when `None`).
struct ScriptedStream {
    reply: Option<String>,
}

impl StreamingTranscriber for ScriptedStream {
    fn feed_frame(&mut self, _frame: &[i16]) -> Result<Option<String>, SttError> {
        Ok(self.reply.clone())
    }

    fn reset(&mut self) {}
}

struct ScriptedFallback {
    available: bool,
    intent: Option<Intent>,
}

#[async_trait]
impl FallbackRouter for ScriptedFallback {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn route(&self, text: &str) -> Intent {
        self.intent.clone().unwrap_or_else(|| Intent::unknown(text))
    }
}

struct RecordingCue {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl SoundCue for RecordingCue {
    fn play_wake(&self) {
        self.calls.lock().unwrap().push("wake");
    }

    fn play_searching(&self) {
        self.calls.lock().unwrap().push("searching");
    }

    fn play_error(&self) {
        self.calls.lock().unwrap().push("error");
    }
}

/// Effector that reports a fixed volume and records every call.
struct RecordingEffector {
    calls: Arc<Mutex<Vec<String>>>,
    volume: f32,
}

impl Effector for RecordingEffector {
    fn volume_get(&mut self) -> Result<f32, EffectorError> {
        self.calls.lock().unwrap().push("get".to_string());
        Ok(self.volume)
    }

    fn volume_set(&mut self, level: u8) -> Result<(), EffectorError> {
        self.calls.lock().unwrap().push(format!("set:{level}"));
        Ok(())
    }

    fn next_track(&mut self) -> Result<(), EffectorError> {
        self.calls.lock().unwrap().push("next".to_string());
        Ok(())
    }

    fn prev_track(&mut self) -> Result<(), EffectorError> {
        self.calls.lock().unwrap().push("prev".to_string());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), EffectorError> {
        self.calls.lock().unwrap().push("shutdown".to_string());
        Ok(())
    }

    fn reboot(&mut self) -> Result<(), EffectorError> {
        self.calls.lock().unwrap().push("reboot".to_string());
        Ok(())
    }
}

struct RecordingProvider {
    results: Vec<MediaResult>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MediaProvider for RecordingProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn search(&mut self, query: &str, _limit: usize) -> Vec<MediaResult> {
        self.calls.lock().unwrap().push(format!("search:{query}"));
        self.results.clone()
    }

    fn play(&mut self, result: &MediaResult) -> String {
        self.calls
            .lock()
            .unwrap()
            .push(format!("play:{}", result.title));
        format!("Включаю: «{}»", result.title)
    }

    fn pause(&mut self) -> String {
        self.calls.lock().unwrap().push("pause".to_string());
        "Пауза".to_string()
    }

    fn resume(&mut self) -> String {
        self.calls.lock().unwrap().push("resume".to_string());
        "Продолжаю".to_string()
    }

    fn fullscreen(&mut self) -> String {
        self.calls.lock().unwrap().push("fullscreen".to_string());
        "Полный экран".to_string()
    }
}

// -------------------------------------------------------------- harness

struct Rig {
    wake_scores: Vec<f32>,
    vad: Vec<bool>,
    transcript: String,
    confirm_reply: Option<String>,
    fallback_available: bool,
    fallback_intent: Option<Intent>,
    volume: f32,
    media_results: Vec<MediaResult>,
    preactivate_media: bool,
}

impl Default for Rig {
    fn default() -> Self {
        Self {
            wake_scores: vec![0.95],
            vad: Vec::new(),
            transcript: String::new(),
            confirm_reply: None,
            fallback_available: false,
            fallback_intent: None,
            volume: 0.5,
            media_results: vec![MediaResult::new(
                "Интерстеллар",
                "https://example.com/1",
                "stub",
            )],
            preactivate_media: false,
        }
    }
}

struct Handles {
    source_calls: Arc<Mutex<Vec<&'static str>>>,
    effector_calls: Arc<Mutex<Vec<String>>>,
    cue_calls: Arc<Mutex<Vec<&'static str>>>,
    provider_calls: Arc<Mutex<Vec<String>>>,
}

impl Handles {
    /// Only the volume_set calls, as levels, in order.
    fn volume_sets(&self) -> Vec<u8> {
        self.effector_calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix("set:"))
            .map(|level| level.parse().unwrap())
            .collect()
    }

    fn count(&self, call: &str) -> usize {
        self.effector_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == call)
            .count()
    }
}

impl Rig {
    fn build(self) -> (Orchestrator, Handles) {
        let source_calls = Arc::new(Mutex::new(Vec::new()));
        let effector_calls = Arc::new(Mutex::new(Vec::new()));
        let cue_calls = Arc::new(Mutex::new(Vec::new()));
        let provider_calls = Arc::new(Mutex::new(Vec::new()));

        let mut media = MediaManager::new();
        media.register(Box::new(RecordingProvider {
            results: self.media_results,
            calls: Arc::clone(&provider_calls),
        }));
        if self.preactivate_media {
            media.play("прогрев");
            provider_calls.lock().unwrap().clear();
        }

        let components = Components {
            capture: Box::new(NullSource {
                calls: Arc::clone(&source_calls),
            }),
            aec: EchoCanceller::disabled(),
            noise: NoiseSuppressor::passthrough(),
            vad: Box::new(ScriptedVad {
                script: self.vad.into(),
            }),
            wake_word: WakeWordDetector::new(
                vec![Box::new(ScriptedWake {
                    script: self.wake_scores.into(),
                })],
                0.8,
            ),
            wake_verifier: WakeWordVerifier::default(),
            stt_router: SttRouter::new(
                Box::new(FixedTranscriber(self.transcript)),
                Box::new(ScriptedStream {
                    reply: self.confirm_reply,
                }),
            ),
            intent_router: RegexIntentRouter::new(),
            llm_fallback: Box::new(ScriptedFallback {
                available: self.fallback_available,
                intent: self.fallback_intent,
            }),
            media,
            feedback: Box::new(RecordingCue {
                calls: Arc::clone(&cue_calls),
            }),
            effector: Box::new(RecordingEffector {
                calls: Arc::clone(&effector_calls),
                volume: self.volume,
            }),
        };

        let orchestrator = Orchestrator::new(components, Tuning::default());
        let handles = Handles {
            source_calls,
            effector_calls,
            cue_calls,
            provider_calls,
        };
        (orchestrator, handles)
    }
}

/// Feed the wake frame: loud mic, quiet loopback, confident detector.
async fn wake(orchestrator: &mut Orchestrator) {
    orchestrator.process_frame(make_frame(5000, 100)).await;
    assert_eq!(orchestrator.state(), State::Listening);
}

/// Feed speech frames followed by enough silence to end the utterance.
/// The scripted VAD must be loaded with matching decisions.
async fn speech_then_silence(orchestrator: &mut Orchestrator, speech: usize) {
    for _ in 0..speech {
        orchestrator.process_frame(make_frame(2000, 0)).await;
    }
    for _ in 0..SILENCE_THRESHOLD + 1 {
        if orchestrator.state() == State::Listening || orchestrator.state() == State::Confirming {
            orchestrator.process_frame(make_frame(0, 0)).await;
        }
    }
}

/// Everything that must hold whenever the machine is back in Idle.
fn assert_idle_invariants(orchestrator: &Orchestrator) {
    assert_eq!(orchestrator.state(), State::Idle);
    assert!(orchestrator.saved_volume.is_none());
    assert!(orchestrator.speech_buffer.is_empty());
    assert!(orchestrator.pending_intent.is_none());
}

// ---------------------------------------------------- state transitions

#[tokio::test(flavor = "multi_thread")]
async fn test_wake_word_transitions_to_listening() {
    let (mut orchestrator, handles) = Rig::default().build();

    wake(&mut orchestrator).await;

    assert_eq!(*handles.cue_calls.lock().unwrap(), vec!["wake"]);
    // Auto-mute ducked 50% to 5%
    assert_eq!(handles.volume_sets(), vec![5]);
    assert_eq!(orchestrator.saved_volume, Some(0.5));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_low_confidence_wake_stays_idle() {
    let (mut orchestrator, handles) = Rig {
        wake_scores: vec![0.4],
        ..Rig::default()
    }
    .build();

    orchestrator.process_frame(make_frame(5000, 100)).await;

    assert_eq!(orchestrator.state(), State::Idle);
    assert!(handles.cue_calls.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_speaker_origin_wake_rejected() {
    let (mut orchestrator, handles) = Rig::default().build();

    // Confident detection, but mic and loopback energies match: the
    // wake word is coming out of our own speakers
    orchestrator.process_frame(make_frame(100, 100)).await;

    assert_eq!(orchestrator.state(), State::Idle);
    assert!(handles.cue_calls.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_speech_resets_silence_counter() {
    let (mut orchestrator, _handles) = Rig {
        vad: vec![false, false, true],
        ..Rig::default()
    }
    .build();
    orchestrator.state = State::Listening;

    for _ in 0..3 {
        orchestrator.process_frame(make_frame(2000, 0)).await;
    }

    assert_eq!(orchestrator.state(), State::Listening);
    assert_eq!(orchestrator.silence_frames, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_max_duration_ends_utterance() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 32],
        transcript: "пауза".to_string(),
        preactivate_media: true,
        ..Rig::default()
    }
    .build();
    orchestrator.tuning.max_listen_seconds = 0.1;
    wake(&mut orchestrator).await;

    // Non-stop speech: the 0.1 s cap fires after four 32 ms frames
    for _ in 0..4 {
        orchestrator.process_frame(make_frame(2000, 0)).await;
    }

    assert_idle_invariants(&orchestrator);
    assert_eq!(*handles.provider_calls.lock().unwrap(), vec!["pause"]);
}

// ------------------------------------------------- end-to-end scenarios

#[tokio::test(flavor = "multi_thread")]
async fn test_s1_play_media() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "включи интерстеллар".to_string(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(
        *handles.provider_calls.lock().unwrap(),
        vec!["search:интерстеллар", "play:Интерстеллар"]
    );
    assert_eq!(*handles.cue_calls.lock().unwrap(), vec!["wake", "searching"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s2_pause() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "пауза".to_string(),
        preactivate_media: true,
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(*handles.provider_calls.lock().unwrap(), vec!["pause"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s3_volume_set_and_restore() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "громкость 50".to_string(),
        ..Rig::default()
    }
    .build();
    // A muted sub-session is already open with 80% saved
    orchestrator.state = State::Listening;
    orchestrator.saved_volume = Some(0.8);

    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    // Exactly the commanded level, then the restore; nothing else
    assert_eq!(handles.volume_sets(), vec![50, 80]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s4_shutdown_confirmed() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "выключи компьютер".to_string(),
        confirm_reply: Some("да".to_string()),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_eq!(orchestrator.state(), State::Confirming);
    assert!(orchestrator.pending_intent.is_some());
    assert_eq!(
        orchestrator.pending_intent.as_ref().unwrap().kind,
        IntentKind::Shutdown
    );
    // Volume stays ducked while the question is open
    assert_eq!(handles.volume_sets(), vec![5]);

    // Reply «да», then silence
    speech_then_silence(&mut orchestrator, 0).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.count("shutdown"), 1);
    assert_eq!(handles.volume_sets(), vec![5, 50]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s5_shutdown_rejected() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "выключи компьютер".to_string(),
        confirm_reply: Some("нет".to_string()),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;
    assert_eq!(orchestrator.state(), State::Confirming);

    speech_then_silence(&mut orchestrator, 0).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.count("shutdown"), 0);
    // Rejection still restores the ducked volume
    assert_eq!(handles.volume_sets(), vec![5, 50]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s6_llm_fallback_volume_down() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "сделай потише".to_string(),
        fallback_available: true,
        fallback_intent: Some(Intent::new(IntentKind::VolumeDown)),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    // Duck to 5, step 50 down to 40, restore to 50
    assert_eq!(handles.volume_sets(), vec![5, 40, 50]);
    assert!(!handles.cue_calls.lock().unwrap().contains(&"error"));
}

// ------------------------------------------------------- intent details

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_intent_plays_error_cue() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "какая сегодня погода".to_string(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(
        *handles.cue_calls.lock().unwrap(),
        vec!["wake", "searching", "error"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_transcript_is_unknown() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: String::new(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert!(handles.cue_calls.lock().unwrap().contains(&"error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_volume_up_rounds_and_clamps() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "громче".to_string(),
        volume: 0.98,
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    // Duck rounds 9.8 to 10; 98 + 10 clamps to 100; restore to 98
    assert_eq!(handles.volume_sets(), vec![10, 100, 98]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_volume_set_clamps_out_of_range_level() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "громкость 150".to_string(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.volume_sets(), vec![5, 100, 50]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_next_track_reaches_effector() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "дальше".to_string(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.count("next"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_is_a_noop() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "закрой".to_string(),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;

    assert_idle_invariants(&orchestrator);
    assert!(handles.provider_calls.lock().unwrap().is_empty());
    assert_eq!(handles.count("next"), 0);
    assert_eq!(*handles.cue_calls.lock().unwrap(), vec!["wake", "searching"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reboot_held_for_confirmation() {
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "перезагрузи".to_string(),
        confirm_reply: Some("подтверждаю".to_string()),
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;
    assert_eq!(orchestrator.state(), State::Confirming);
    assert_eq!(
        orchestrator.pending_intent.as_ref().unwrap().kind,
        IntentKind::Reboot
    );

    speech_then_silence(&mut orchestrator, 0).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.count("reboot"), 1);
    assert_eq!(handles.count("shutdown"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_confirmation_timeout_without_reply_rejects() {
    // The streaming backend never finalizes: empty transcript, reject
    let (mut orchestrator, handles) = Rig {
        vad: vec![true; 3],
        transcript: "выключи компьютер".to_string(),
        confirm_reply: None,
        ..Rig::default()
    }
    .build();

    wake(&mut orchestrator).await;
    speech_then_silence(&mut orchestrator, 3).await;
    assert_eq!(orchestrator.state(), State::Confirming);

    speech_then_silence(&mut orchestrator, 0).await;

    assert_idle_invariants(&orchestrator);
    assert_eq!(handles.count("shutdown"), 0);
}

// ------------------------------------------------------------- lifecycle

#[tokio::test(flavor = "multi_thread")]
async fn test_run_always_releases_capture() {
    let (mut orchestrator, handles) = Rig::default().build();

    // Flag already lowered: the loop exits immediately, but capture must
    // still be started and stopped in pairs
    let running = Arc::new(AtomicBool::new(false));
    orchestrator.run(running).await.unwrap();

    assert_eq!(*handles.source_calls.lock().unwrap(), vec!["start", "stop"]);
}
