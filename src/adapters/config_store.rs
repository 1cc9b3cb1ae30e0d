use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

/// TOML-based configuration store under the OS config directory
/// (`~/.config/sayclip` on Linux, the platform equivalent elsewhere).
pub struct TomlConfigStore {
    data_dir: PathBuf,
}

impl TomlConfigStore {
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = dirs::config_dir()
            .map(|p| p.join("sayclip"))
            .ok_or_else(|| {
                DomainError::Config("could not determine the configuration directory".to_string())
            })?;
        fs::create_dir_all(&data_dir)?;
        info!(data_dir = ?data_dir, "config store initialized");
        Ok(Self { data_dir })
    }

    /// Store rooted at an explicit directory (tests, portable installs).
    pub fn with_dir(data_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let path = self.config_path();
        if path.exists() {
            debug!(path = ?path, "loading configuration");
            let content = fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            info!(path = ?path, "no configuration found, writing defaults");
            let config = AppConfig::default();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let path = self.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(config)?)?;
        debug!(path = ?path, "configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_dir(dir.path().to_path_buf()).unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.transcription.model, "base");
        assert!(store.config_path().exists());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_dir(dir.path().to_path_buf()).unwrap();

        let mut config = AppConfig::default();
        config.transcription.model = "small".to_string();
        config.logging.level = "debug".to_string();
        config.audio.device = Some("usb-mic".to_string());
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.transcription.model, "small");
        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.audio.device.as_deref(), Some("usb-mic"));
    }

    #[test]
    fn test_derived_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::with_dir(dir.path().to_path_buf()).unwrap();
        assert!(store.logs_dir().ends_with("logs"));
        assert!(store.models_dir().ends_with("models"));
        assert!(store.config_path().ends_with("config.toml"));
    }
}
