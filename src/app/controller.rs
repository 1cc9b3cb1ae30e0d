use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::adapters::WavSinkFactory;
use crate::app::capture::{AudioCaptureSession, CaptureEvent};
use crate::app::transcription::{SpeechEvent, TranscriptionCoordinator};
use crate::domain::{
    AppConfig, AppState, AudioDevice, CoreEvent, DomainError, StateMachine,
};
use crate::ports::{AudioBackend, SpeechEngine};
use crate::runtime::{Marshal, TaskRunner};

/// Grace periods for teardown; forced data loss past these is by design.
const TASK_GRACE: Duration = Duration::from_secs(1);
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Application root: owns the capture session, the transcription
/// coordinator and the state machine, and fans every notification out
/// through one typed event channel.
///
/// All methods must be called from the owner context the marshal belongs
/// to; worker results arrive through the marshal and are handled here too,
/// so component state is only ever mutated on that context.
pub struct DictationController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    capture: Arc<AudioCaptureSession>,
    coordinator: TranscriptionCoordinator,
    machine: Mutex<StateMachine>,
    events: broadcast::Sender<CoreEvent>,
    config: AppConfig,
}

impl DictationController {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        engine: Arc<dyn SpeechEngine>,
        marshal: Marshal,
        runtime: Handle,
        config: AppConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);

        let capture = AudioCaptureSession::new(
            backend,
            Arc::new(WavSinkFactory),
            marshal.clone(),
            config.audio.clone(),
        );
        let runner = TaskRunner::new(marshal, runtime);
        let coordinator = TranscriptionCoordinator::new(engine, runner);

        let mut machine = StateMachine::new();
        let state_events = events.clone();
        machine.set_observer(Box::new(move |state, status| {
            let _ = state_events.send(CoreEvent::StateChanged {
                state,
                status: status.to_string(),
            });
        }));

        let inner = Arc::new(ControllerInner {
            capture: Arc::clone(&capture),
            coordinator,
            machine: Mutex::new(machine),
            events,
            config,
        });

        let weak = Arc::downgrade(&inner);
        capture.set_event_handler(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_capture_event(event);
            }
        }));

        let weak = Arc::downgrade(&inner);
        inner.coordinator.set_event_handler(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_speech_event(event);
            }
        }));

        Self { inner }
    }

    /// Probe the configured device and kick off the configured model load,
    /// landing in Ready / NoAudio / NoModel accordingly.
    pub fn initialize(&self) {
        let inner = &self.inner;
        info!("initializing dictation core");

        if let Err(err) = inner.capture.open_stream(inner.config.audio.device.as_deref()) {
            warn!(%err, "audio initialization failed");
            let _ = inner.events.send(CoreEvent::AudioError {
                message: err.to_string(),
            });
            inner.transition(AppState::NoAudio, None);
            return;
        }

        let model = inner.config.transcription.model.trim().to_string();
        inner.transition(AppState::NoModel, None);
        if !model.is_empty() {
            self.load_model(&model);
        }
    }

    /// Subscribe to the core event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn start_recording(&self) {
        let inner = &self.inner;
        if !inner.machine.lock().state().can_record() {
            inner.report_audio_error(DomainError::Busy);
            return;
        }
        if let Err(err) = inner.capture.start_recording() {
            inner.report_audio_error(err);
        }
    }

    pub fn stop_recording(&self) {
        if let Err(err) = self.inner.capture.stop_recording() {
            self.inner.report_audio_error(err);
        }
    }

    pub fn set_device(&self, device: Option<&str>) {
        let inner = &self.inner;
        if !inner.machine.lock().state().can_change_settings() {
            inner.report_audio_error(DomainError::Busy);
            return;
        }
        match inner.capture.set_device(device) {
            Ok(()) => {
                info!(?device, "input device changed");
                if inner.machine.lock().state() == AppState::NoAudio {
                    inner.transition(inner.rest_state(), None);
                }
            }
            Err(err) => inner.report_audio_error(err),
        }
    }

    pub fn load_model(&self, name: &str) {
        let inner = &self.inner;
        let state = inner.machine.lock().state();
        // Recording/Processing block model changes outright; a load already
        // in flight is reported as AlreadyInFlight by the coordinator.
        if matches!(state, AppState::Recording | AppState::Processing) {
            inner.report_speech_error(DomainError::Busy);
            return;
        }
        match inner.coordinator.load_model(name) {
            Ok(()) => inner.transition(AppState::ModelLoading, None),
            Err(err) => inner.report_speech_error(err),
        }
    }

    /// Normally invoked by the core itself on file-ready, but exposed for
    /// re-transcribing an existing recording.
    pub fn transcribe(&self, path: &Path) {
        self.inner.begin_transcription(path);
    }

    pub fn available_models(&self) -> Vec<String> {
        self.inner.coordinator.available_models()
    }

    pub fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        self.inner.capture.list_input_devices()
    }

    pub fn current_device(&self) -> Option<String> {
        self.inner.capture.current_device()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.capture.is_ready()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.inner.coordinator.is_model_loaded()
    }

    pub fn state(&self) -> AppState {
        self.inner.machine.lock().state()
    }

    pub fn status(&self) -> String {
        self.inner.machine.lock().status().to_string()
    }

    /// Delete a recording file; an already-absent file counts as success.
    pub fn delete_recording(&self, path: &Path) -> Result<(), DomainError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(?path, "recording deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "recording already absent");
                Ok(())
            }
            Err(err) => Err(DomainError::Io(err.to_string())),
        }
    }

    /// Graceful teardown: bounded wait for in-flight tasks, then release
    /// the device and discard the queue regardless.
    pub fn cleanup(&self) {
        info!("shutting down dictation core");
        if !self.inner.coordinator.wait_idle(TASK_GRACE) {
            warn!("background task still in flight at shutdown");
        }
        self.inner.capture.shutdown(WRITER_GRACE);
    }
}

impl ControllerInner {
    fn transition(&self, next: AppState, status: Option<String>) {
        self.machine.lock().transition(next, status);
    }

    /// The state the application settles into when nothing is in flight.
    fn rest_state(&self) -> AppState {
        if !self.capture.is_ready() {
            AppState::NoAudio
        } else if self.coordinator.is_model_loaded() {
            AppState::Ready
        } else {
            AppState::NoModel
        }
    }

    fn report_audio_error(&self, error: DomainError) {
        let message = error.to_string();
        let _ = self.events.send(CoreEvent::AudioError {
            message: message.clone(),
        });
        if error.is_benign() {
            return;
        }
        match error {
            DomainError::DeviceUnavailable(_) => self.transition(AppState::NoAudio, Some(message)),
            _ => self.transition(AppState::Error, Some(message)),
        }
    }

    fn report_speech_error(&self, error: DomainError) {
        let message = error.to_string();
        let _ = self.events.send(CoreEvent::TranscriptionError {
            message: message.clone(),
        });
        if !error.is_benign() {
            self.transition(AppState::Error, Some(message));
        }
    }

    fn begin_transcription(&self, path: &Path) {
        match self.coordinator.transcribe(path) {
            Ok(()) => {}
            Err(err @ DomainError::NoModelLoaded) => {
                let _ = self.events.send(CoreEvent::TranscriptionError {
                    message: err.to_string(),
                });
                self.transition(AppState::NoModel, None);
            }
            Err(err) => self.report_speech_error(err),
        }
    }

    fn on_capture_event(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Started => {
                let _ = self.events.send(CoreEvent::RecordingStarted);
                self.transition(AppState::Recording, None);
            }
            CaptureEvent::Stopped => {
                let _ = self.events.send(CoreEvent::RecordingStopped);
                self.transition(AppState::Processing, None);
            }
            CaptureEvent::FileReady { path } => {
                let _ = self.events.send(CoreEvent::FileReady { path: path.clone() });
                // Only chain into transcription on the normal stop path; a
                // session that finished after a fatal error just reports
                // its file.
                if self.machine.lock().state() == AppState::Processing {
                    self.begin_transcription(&path);
                }
            }
            CaptureEvent::DrainFailed { error } => {
                let _ = self.events.send(CoreEvent::AudioError {
                    message: error.to_string(),
                });
                // The capture side is idle again; a failed drain does not
                // take recording capability away.
                self.transition(self.rest_state(), None);
            }
            CaptureEvent::StreamLost { message } => {
                let _ = self.events.send(CoreEvent::AudioError {
                    message: message.clone(),
                });
                self.transition(AppState::Error, Some(message));
            }
        }
    }

    fn on_speech_event(&self, event: SpeechEvent) {
        match event {
            SpeechEvent::ModelLoaded { name } => {
                let _ = self.events.send(CoreEvent::ModelLoaded { name });
                let next = if self.capture.is_ready() {
                    AppState::Ready
                } else {
                    AppState::NoAudio
                };
                self.transition(next, None);
            }
            SpeechEvent::ModelLoadFailed { error } => {
                let message = error.to_string();
                let _ = self.events.send(CoreEvent::TranscriptionError {
                    message: message.clone(),
                });
                self.transition(AppState::Error, Some(message));
            }
            SpeechEvent::Transcribed { text } => {
                let _ = self.events.send(CoreEvent::TranscriptionComplete { text });
                self.transition(AppState::Ready, None);
            }
            SpeechEvent::TranscribeFailed { error } => {
                let message = error.to_string();
                let _ = self.events.send(CoreEvent::TranscriptionError {
                    message: message.clone(),
                });
                self.transition(AppState::Error, Some(message));
            }
        }
    }
}
