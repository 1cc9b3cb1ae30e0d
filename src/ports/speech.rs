use std::path::Path;

use crate::domain::DomainError;

/// Port for the speech model, treated as an opaque black box.
///
/// Both operations block and are driven from task-runner worker threads,
/// never from the owner context.
pub trait SpeechEngine: Send + Sync {
    /// Load the named model, replacing any previously loaded one. On
    /// failure no model remains loaded.
    fn load(&self, name: &str) -> Result<(), DomainError>;

    /// Transcribe the recording at `path` with the loaded model.
    fn transcribe(&self, path: &Path) -> Result<String, DomainError>;

    /// Names of models this engine can load.
    fn available_models(&self) -> Vec<String>;

    fn is_loaded(&self) -> bool;
}
