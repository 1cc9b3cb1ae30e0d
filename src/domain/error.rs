use thiserror::Error;

use crate::domain::transcription::TaskKind;

/// Domain-level errors.
///
/// Everything that can go wrong crosses the worker/owner boundary as one of
/// these, carried by an error callback or event. Nothing is thrown across
/// threads.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("audio system is busy")]
    Busy,

    #[error("a {0} task is already in flight")]
    AlreadyInFlight(TaskKind),

    #[error("no model name given")]
    EmptyModelName,

    #[error("no audio file path given")]
    EmptyPath,

    #[error("no model loaded")]
    NoModelLoaded,

    #[error("failed to write recording: {0}")]
    FileWrite(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DomainError {
    /// Precondition violations that are reported as a message only, without
    /// driving a state transition. Everything else also moves the
    /// application state.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            DomainError::AlreadyRecording
                | DomainError::NotRecording
                | DomainError::Busy
                | DomainError::AlreadyInFlight(_)
                | DomainError::EmptyModelName
                | DomainError::EmptyPath
                | DomainError::NoModelLoaded
        )
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<hound::Error> for DomainError {
    fn from(err: hound::Error) -> Self {
        DomainError::FileWrite(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_are_benign() {
        assert!(DomainError::AlreadyRecording.is_benign());
        assert!(DomainError::NotRecording.is_benign());
        assert!(DomainError::Busy.is_benign());
        assert!(DomainError::AlreadyInFlight(TaskKind::ModelLoad).is_benign());
        assert!(DomainError::EmptyModelName.is_benign());
        assert!(DomainError::EmptyPath.is_benign());
        assert!(DomainError::NoModelLoaded.is_benign());
    }

    #[test]
    fn test_failures_are_not_benign() {
        assert!(!DomainError::DeviceUnavailable("gone".to_string()).is_benign());
        assert!(!DomainError::FileWrite("disk full".to_string()).is_benign());
        assert!(!DomainError::Transcription("decode".to_string()).is_benign());
        assert!(!DomainError::ModelLoad("missing".to_string()).is_benign());
    }

    #[test]
    fn test_in_flight_message_names_the_kind() {
        let err = DomainError::AlreadyInFlight(TaskKind::Transcribe);
        assert_eq!(err.to_string(), "a transcribe task is already in flight");
    }
}
