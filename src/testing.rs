//! Crate-private fakes for exercising the coordinator without hardware.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::domain::{AudioDevice, AudioFrame, DomainError};
use crate::ports::{
    AudioBackend, DataCallback, RecordingSink, SinkFactory, SpeechEngine, StreamErrorCallback,
    StreamInfo,
};

/// Poll `pred` until it holds or two seconds pass.
pub(crate) fn wait_until(mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Thread-safe event collector usable as a capture/speech event handler.
pub(crate) struct CollectedEvents<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> CollectedEvents<E> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, event: E) {
        self.events.lock().push(event);
    }

    pub fn any(&self, pred: impl Fn(&E) -> bool) -> bool {
        self.events.lock().iter().any(|e| pred(e))
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove all matching events; true if at least one matched.
    pub fn drain_matching(&self, pred: impl Fn(&E) -> bool) -> bool {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| !pred(e));
        events.len() != before
    }
}

impl<E> Clone for CollectedEvents<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

/// Audio backend whose "hardware callbacks" are driven by the test.
pub(crate) struct FakeBackend {
    data_cb: Mutex<Option<DataCallback>>,
    error_cb: Mutex<Option<StreamErrorCallback>>,
    open: AtomicBool,
    fail_next_open: AtomicBool,
    sample_rate: u32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            data_cb: Mutex::new(None),
            error_cb: Mutex::new(None),
            open: AtomicBool::new(false),
            fail_next_open: AtomicBool::new(false),
            sample_rate: 16_000,
        }
    }

    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Deliver one hardware buffer to the stream callback.
    pub fn feed(&self, samples: &[i16]) {
        let mut guard = self.data_cb.lock();
        if let Some(cb) = guard.as_mut() {
            cb(samples);
        }
    }

    /// Fire the stream error callback. The callback is taken out first so
    /// re-entrant close_input calls cannot deadlock.
    pub fn raise_error(&self, message: &str) {
        let cb = self.error_cb.lock().take();
        if let Some(mut cb) = cb {
            cb(message.to_string());
        }
    }
}

impl AudioBackend for FakeBackend {
    fn open_input(
        &self,
        _device: Option<&str>,
        channels: u16,
        data: DataCallback,
        error: StreamErrorCallback,
    ) -> Result<StreamInfo, DomainError> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(DomainError::DeviceUnavailable("fake open failure".to_string()));
        }
        *self.data_cb.lock() = Some(data);
        *self.error_cb.lock() = Some(error);
        self.open.store(true, Ordering::SeqCst);
        Ok(StreamInfo {
            sample_rate: self.sample_rate,
            channels,
        })
    }

    fn close_input(&self) {
        self.data_cb.lock().take();
        self.error_cb.lock().take();
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        Ok(vec![AudioDevice {
            id: "fake-mic".to_string(),
            name: "Fake Microphone".to_string(),
            is_default: true,
        }])
    }
}

/// Sink that records frames in memory instead of writing a file.
pub(crate) struct MemorySinkFactory {
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    finalized: Arc<AtomicBool>,
    fail_writes: AtomicBool,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            finalized: Arc::new(AtomicBool::new(false)),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<AudioFrame> {
        self.frames.lock().clone()
    }

    pub fn finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(
        &self,
        _path: &Path,
        _sample_rate: u32,
        _channels: u16,
    ) -> Result<Box<dyn RecordingSink>, DomainError> {
        self.finalized.store(false, Ordering::SeqCst);
        self.frames.lock().clear();
        Ok(Box::new(MemorySink {
            frames: Arc::clone(&self.frames),
            finalized: Arc::clone(&self.finalized),
            fail_writes: self.fail_writes.load(Ordering::SeqCst),
        }))
    }
}

struct MemorySink {
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    finalized: Arc<AtomicBool>,
    fail_writes: bool,
}

impl RecordingSink for MemorySink {
    fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::FileWrite("fake write failure".to_string()));
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), DomainError> {
        self.finalized.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Speech engine with scripted behavior.
pub(crate) struct StubEngine {
    loaded: Mutex<Option<String>>,
    transcript: Mutex<String>,
    fail_load: AtomicBool,
    fail_transcribe: AtomicBool,
    /// When set, `load` blocks until the gate is released.
    load_gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
}

impl StubEngine {
    pub fn new(transcript: &str) -> Self {
        Self {
            loaded: Mutex::new(None),
            transcript: Mutex::new(transcript.to_string()),
            fail_load: AtomicBool::new(false),
            fail_transcribe: AtomicBool::new(false),
            load_gate: Mutex::new(None),
        }
    }

    pub fn fail_next_load(&self) {
        self.fail_load.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_transcribe(&self) {
        self.fail_transcribe.store(true, Ordering::SeqCst);
    }

    /// Make the next `load` block; returns the sender that releases it.
    pub fn gate_load(&self) -> std::sync::mpsc::Sender<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        *self.load_gate.lock() = Some(rx);
        tx
    }
}

impl SpeechEngine for StubEngine {
    fn load(&self, name: &str) -> Result<(), DomainError> {
        let gate = self.load_gate.lock().take();
        if let Some(gate) = gate {
            gate.recv().ok();
        }
        self.loaded.lock().take();
        if self.fail_load.swap(false, Ordering::SeqCst) {
            return Err(DomainError::ModelLoad(format!("stub refuses '{name}'")));
        }
        *self.loaded.lock() = Some(name.to_string());
        Ok(())
    }

    fn transcribe(&self, path: &Path) -> Result<String, DomainError> {
        if self.loaded.lock().is_none() {
            return Err(DomainError::NoModelLoaded);
        }
        if self.fail_transcribe.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Transcription(format!(
                "stub failed on {}",
                path.display()
            )));
        }
        Ok(self.transcript.lock().clone())
    }

    fn available_models(&self) -> Vec<String> {
        vec!["tiny".to_string(), "base".to_string()]
    }

    fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }
}
