// YAML configuration surface
// Every section falls back to its defaults when absent, so a partial
// (or missing) config file is always usable.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while locating or parsing the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    /// Input device name; `None` selects the host default microphone
    pub mic_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 512,
            mic_device: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AecConfig {
    pub enabled: bool,
    pub filter_length: usize,
    /// Fraction of the saved volume kept while listening
    pub auto_mute_factor: f32,
}

impl Default for AecConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_length: 1024,
            auto_mute_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    pub model_path: String,
    pub threshold: f32,
    pub energy_ratio_threshold: f32,
    /// Phrase the spotter listens for in streaming transcripts
    pub phrase: String,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            model_path: "models/wake-eou".to_string(),
            threshold: 0.8,
            energy_ratio_threshold: 1.5,
            phrase: "джарвис".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub general_model: String,
    pub general_device: String,
    pub general_compute_type: String,
    pub confirm_model_path: String,
    pub max_listen_seconds: f32,
    pub language: String,
    /// When set, each completed utterance is written here as a WAV file
    pub dump_dir: Option<PathBuf>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            general_model: "models/ggml-large-v3-turbo.bin".to_string(),
            general_device: "cuda".to_string(),
            general_compute_type: "int8".to_string(),
            confirm_model_path: "models/confirm-eou".to_string(),
            max_listen_seconds: 5.0,
            language: "ru".to_string(),
            dump_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmFallbackConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
}

impl Default for LlmFallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "qwen3:4b".to_string(),
        }
    }
}

/// Top-level assistant configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub audio: AudioConfig,
    pub aec: AecConfig,
    pub wake_word: WakeWordConfig,
    pub stt: SttConfig,
    pub llm_fallback: LlmFallbackConfig,
}

impl AssistantConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Default config file location under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("golos").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.frame_size, 512);
        assert!(config.audio.mic_device.is_none());
        assert!(config.aec.enabled);
        assert_eq!(config.aec.filter_length, 1024);
        assert_eq!(config.aec.auto_mute_factor, 0.1);
        assert_eq!(config.wake_word.threshold, 0.8);
        assert_eq!(config.wake_word.energy_ratio_threshold, 1.5);
        assert_eq!(config.stt.max_listen_seconds, 5.0);
        assert_eq!(config.stt.language, "ru");
        assert!(config.llm_fallback.enabled);
        assert_eq!(config.llm_fallback.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "audio:\n  sample_rate: 48000\nwake_word:\n  threshold: 0.9"
        )
        .unwrap();

        let config = AssistantConfig::load(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 48_000);
        // Unset key inside a present section falls back too
        assert_eq!(config.audio.frame_size, 512);
        assert_eq!(config.wake_word.threshold, 0.9);
        assert_eq!(config.wake_word.energy_ratio_threshold, 1.5);
        // Entirely absent sections keep defaults
        assert_eq!(config.stt.max_listen_seconds, 5.0);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "audio: [not, a, mapping]").unwrap();

        let err = AssistantConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = AssistantConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
