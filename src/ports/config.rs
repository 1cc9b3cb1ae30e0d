use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Port for configuration persistence.
pub trait ConfigStore: Send + Sync {
    /// Load the configuration, creating defaults if none exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Persist the configuration.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;

    /// Directory holding speech model files.
    fn models_dir(&self) -> PathBuf;
}
