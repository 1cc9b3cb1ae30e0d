use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::{DomainError, TaskKind};
use crate::ports::SpeechEngine;
use crate::runtime::TaskRunner;

/// What the coordinator reports upward, always from the owner context.
#[derive(Debug)]
pub enum SpeechEvent {
    ModelLoaded { name: String },
    ModelLoadFailed { error: DomainError },
    Transcribed { text: String },
    TranscribeFailed { error: DomainError },
}

pub type SpeechEventHandler = Box<dyn Fn(SpeechEvent) + Send + Sync>;

/// Drives the speech engine through the task runner: at most one load and
/// one transcription in flight, results marshaled back to the owner
/// context.
///
/// A failed load clears the active model (there is no loaded model until
/// the next successful load); a failed transcription leaves it untouched.
pub struct TranscriptionCoordinator {
    engine: Arc<dyn SpeechEngine>,
    runner: TaskRunner,
    active_model: Arc<Mutex<Option<String>>>,
    handler: Arc<Mutex<Option<Arc<SpeechEventHandler>>>>,
}

impl TranscriptionCoordinator {
    pub fn new(engine: Arc<dyn SpeechEngine>, runner: TaskRunner) -> Self {
        Self {
            engine,
            runner,
            active_model: Arc::new(Mutex::new(None)),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Register the single upstream event handler.
    pub fn set_event_handler(&self, handler: SpeechEventHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    fn dispatch(handler: &Mutex<Option<Arc<SpeechEventHandler>>>, event: SpeechEvent) {
        let handler = handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Start loading `name`. Rejected synchronously with `EmptyModelName`
    /// for a blank name or `AlreadyInFlight` while a load is running.
    pub fn load_model(&self, name: &str) -> Result<(), DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyModelName);
        }

        let engine = Arc::clone(&self.engine);
        let active_ok = Arc::clone(&self.active_model);
        let active_err = Arc::clone(&self.active_model);
        let handler_ok = Arc::clone(&self.handler);
        let handler_err = Arc::clone(&self.handler);
        self.runner.spawn(
            TaskKind::ModelLoad,
            move || engine.load(&name).map(|()| name),
            move |loaded| {
                *active_ok.lock() = Some(loaded.clone());
                info!(model = %loaded, "model loaded");
                Self::dispatch(&handler_ok, SpeechEvent::ModelLoaded { name: loaded });
            },
            move |error| {
                active_err.lock().take();
                warn!(%error, "model load failed");
                Self::dispatch(&handler_err, SpeechEvent::ModelLoadFailed { error });
            },
        )
    }

    /// Start transcribing the recording at `path`. Rejected synchronously
    /// with `NoModelLoaded`, `EmptyPath` or `AlreadyInFlight`.
    pub fn transcribe(&self, path: &Path) -> Result<(), DomainError> {
        if self.active_model.lock().is_none() {
            return Err(DomainError::NoModelLoaded);
        }
        if path.as_os_str().is_empty() {
            return Err(DomainError::EmptyPath);
        }

        let engine = Arc::clone(&self.engine);
        let handler_ok = Arc::clone(&self.handler);
        let handler_err = Arc::clone(&self.handler);
        let path = path.to_path_buf();
        self.runner.spawn(
            TaskKind::Transcribe,
            move || engine.transcribe(&path).map(|text| text.trim().to_string()),
            move |text| {
                info!(chars = text.len(), "transcription complete");
                Self::dispatch(&handler_ok, SpeechEvent::Transcribed { text });
            },
            move |error| {
                warn!(%error, "transcription failed");
                Self::dispatch(&handler_err, SpeechEvent::TranscribeFailed { error });
            },
        )
    }

    /// A model is loaded and no load is currently in flight.
    pub fn is_model_loaded(&self) -> bool {
        self.active_model.lock().is_some() && !self.runner.in_flight(TaskKind::ModelLoad)
    }

    pub fn active_model(&self) -> Option<String> {
        self.active_model.lock().clone()
    }

    pub fn available_models(&self) -> Vec<String> {
        self.engine.available_models()
    }

    /// Bounded teardown wait for in-flight tasks.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.runner.wait_idle(timeout)
    }
}
