pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod queue;
pub mod state;
pub mod transcription;

pub use audio::{AudioDevice, AudioFrame, RecordingSession, SessionState};
pub use config::{AppConfig, AudioConfig, LoggingConfig, TranscriptionConfig};
pub use error::DomainError;
pub use events::CoreEvent;
pub use queue::{QueueItem, SignalQueue};
pub use state::{AppState, StateMachine};
pub use transcription::TaskKind;
