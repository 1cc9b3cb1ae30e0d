use std::path::PathBuf;

use crate::domain::AppState;

/// Everything the core reports back to the embedding UI layer.
///
/// Events are emitted from the owner context and fan out through a single
/// broadcast channel, so the UI subscribes once instead of wiring a
/// callback per event.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    RecordingStarted,
    RecordingStopped,
    /// A finished recording is on disk and ready for transcription.
    FileReady { path: PathBuf },
    AudioError { message: String },
    ModelLoaded { name: String },
    TranscriptionComplete { text: String },
    TranscriptionError { message: String },
    StateChanged { state: AppState, status: String },
}
