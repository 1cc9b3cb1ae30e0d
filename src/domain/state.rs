use serde::Serialize;

/// Application states that drive which user actions are currently legal.
///
/// Exactly one instance exists, owned by the state machine; workers request
/// transitions through the owner context, never directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Starting up; neither audio nor model has been probed yet.
    Initializing,
    /// Audio system not ready (no input stream could be opened).
    NoAudio,
    /// Audio ready but no model selected/loaded.
    NoModel,
    /// A model load is in flight.
    ModelLoading,
    /// Ready to record: audio open and model loaded.
    Ready,
    /// Actively capturing audio.
    Recording,
    /// Draining and transcribing the last recording.
    Processing,
    /// A failure occurred; recoverable by loading a model or changing device.
    Error,
}

impl AppState {
    pub fn default_status(&self) -> &'static str {
        match self {
            AppState::Initializing => "Starting up...",
            AppState::NoAudio => "Audio system not available",
            AppState::NoModel => "Please select a model",
            AppState::ModelLoading => "Loading model...",
            AppState::Ready => "Ready",
            AppState::Recording => "Recording...",
            AppState::Processing => "Transcribing...",
            AppState::Error => "An error occurred",
        }
    }

    /// Recording can only begin from Ready.
    pub fn can_record(&self) -> bool {
        matches!(self, AppState::Ready)
    }

    /// Model changes are legal when nothing is mid-flight.
    pub fn can_change_model(&self) -> bool {
        matches!(self, AppState::Ready | AppState::NoModel | AppState::Error)
    }

    /// Settings are locked only while capturing.
    pub fn can_change_settings(&self) -> bool {
        !matches!(self, AppState::Recording)
    }
}

type StateObserver = Box<dyn FnMut(AppState, &str) + Send>;

/// Single source of truth for the application state.
///
/// Mutated only through `transition`, which recomputes the status line
/// (default per-state text, or an explicit override) and notifies the one
/// registered observer synchronously within the call. Re-entering the
/// current state is a no-op and produces no notification.
pub struct StateMachine {
    state: AppState,
    status: String,
    observer: Option<StateObserver>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: AppState::Initializing,
            status: AppState::Initializing.default_status().to_string(),
            observer: None,
        }
    }

    /// Register the single subscriber. The state machine supports exactly
    /// one; a second registration replaces the first.
    pub fn set_observer(&mut self, observer: StateObserver) {
        self.observer = Some(observer);
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Move to `next`, recomputing the status message and notifying the
    /// observer. Returns false (and stays silent) when `next` is the
    /// current state.
    pub fn transition(&mut self, next: AppState, status: Option<String>) -> bool {
        if next == self.state {
            return false;
        }
        self.state = next;
        self.status = status.unwrap_or_else(|| next.default_status().to_string());
        if let Some(observer) = self.observer.as_mut() {
            observer(next, &self.status);
        }
        true
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
