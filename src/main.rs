// Binary entry point: load config, wire the pipeline, run the
// orchestrator until interrupted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use golos::audio::aec::DEFAULT_SUB_FRAME;
use golos::audio::{
    AudioCapture, CaptureConfig, EchoCanceller, NoiseSuppressor, VoiceActivityDetector,
};
use golos::config::AssistantConfig;
use golos::control::DesktopEffector;
use golos::feedback::SoundFeedback;
use golos::intents::{DisabledFallback, FallbackRouter, LlmFallbackRouter, RegexIntentRouter};
use golos::media::MediaManager;
use golos::orchestrator::{Components, Orchestrator, Tuning};
use golos::stt::{EouStt, SttRouter, WhisperStt};
use golos::wakeword::{PhraseSpotter, WakeWordDetector, WakeWordVerifier};
use golos::{error, info, warn};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let capture = AudioCapture::new(CaptureConfig {
        sample_rate: config.audio.sample_rate,
        frame_size: config.audio.frame_size,
        mic_device: config.audio.mic_device.clone(),
        ..CaptureConfig::default()
    });

    let aec = if config.aec.enabled {
        EchoCanceller::new(config.aec.filter_length, DEFAULT_SUB_FRAME)
    } else {
        EchoCanceller::disabled()
    };

    let vad = VoiceActivityDetector::new(
        config.audio.sample_rate,
        golos::audio::vad::DEFAULT_THRESHOLD,
    )?;

    // Wake spotting runs its own streaming recognizer instance
    let spotter_stt = EouStt::load(Path::new(&config.wake_word.model_path))?;
    let wake_word = WakeWordDetector::new(
        vec![Box::new(PhraseSpotter::new(
            Box::new(spotter_stt),
            &config.wake_word.phrase,
        ))],
        config.wake_word.threshold,
    );
    let wake_verifier = WakeWordVerifier::new(
        config.wake_word.energy_ratio_threshold,
        config.wake_word.threshold,
    );

    let general = WhisperStt::load(
        Path::new(&config.stt.general_model),
        &config.stt.language,
        &config.stt.general_device,
    )?;
    let confirm = EouStt::load(Path::new(&config.stt.confirm_model_path))?;
    let stt_router = SttRouter::new(Box::new(general), Box::new(confirm));

    let llm_fallback: Box<dyn FallbackRouter> = if config.llm_fallback.enabled {
        Box::new(LlmFallbackRouter::new(
            &config.llm_fallback.base_url,
            &config.llm_fallback.model,
        ))
    } else {
        Box::new(DisabledFallback)
    };

    let media = MediaManager::new();
    if media.provider_count() == 0 {
        warn!("no media providers configured; playback commands will report so");
    }

    let components = Components {
        capture: Box::new(capture),
        aec,
        noise: NoiseSuppressor::spectral(),
        vad: Box::new(vad),
        wake_word,
        wake_verifier,
        stt_router,
        intent_router: RegexIntentRouter::new(),
        llm_fallback,
        media,
        feedback: Box::new(SoundFeedback::new(config.audio.sample_rate)),
        effector: Box::new(DesktopEffector::new()?),
    };
    let tuning = Tuning {
        max_listen_seconds: config.stt.max_listen_seconds,
        frame_size: config.audio.frame_size,
        sample_rate: config.audio.sample_rate,
        auto_mute_factor: config.aec.auto_mute_factor,
        dump_dir: config.stt.dump_dir.clone(),
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("interrupt received, shutting down");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let mut orchestrator = Orchestrator::new(components, tuning);
    orchestrator.run(running).await?;
    Ok(())
}

/// Resolve the config: explicit path argument first, then the user
/// config directory, then built-in defaults.
fn load_config() -> Result<AssistantConfig, Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        let path = PathBuf::from(arg);
        info!("loading config from {}", path.display());
        return Ok(AssistantConfig::load(&path)?);
    }
    if let Some(path) = AssistantConfig::default_path() {
        if path.exists() {
            info!("loading config from {}", path.display());
            return Ok(AssistantConfig::load(&path)?);
        }
    }
    info!("no config file found, using defaults");
    Ok(AssistantConfig::default())
}
