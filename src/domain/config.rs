use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device id, or None for the system default.
    pub device: Option<String>,
    /// Channels requested from the input stream. Only mono capture is
    /// supported.
    pub channels: u16,
    /// Directory for recording files; falls back to the OS temp dir.
    pub recordings_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            channels: 1,
            recordings_dir: None,
        }
    }
}

/// Transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Model loaded at startup; empty disables auto-loading.
    pub model: String,
    /// Language code (ISO 639-1), or None for auto-detection.
    pub language: Option<String>,
    /// Number of inference threads (0 = auto).
    pub threads: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            language: None,
            threads: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with daily rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.audio.channels, 1);
        assert!(config.audio.device.is_none());
        assert_eq!(config.transcription.model, "base");
        assert_eq!(config.transcription.threads, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [transcription]
            model = "small"
            "#,
        )
        .unwrap();
        assert_eq!(config.transcription.model, "small");
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.logging.level, "info");
    }
}
