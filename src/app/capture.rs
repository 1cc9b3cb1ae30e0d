use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    AudioConfig, AudioDevice, AudioFrame, DomainError, QueueItem, RecordingSession, SessionState,
    SignalQueue,
};
use crate::ports::{
    AudioBackend, DataCallback, RecordingSink, SinkFactory, StreamErrorCallback, StreamInfo,
};
use crate::runtime::Marshal;

/// Session ids are process-unique and never reused.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// What the capture session reports upward.
///
/// `Started` and `Stopped` fire synchronously inside the start/stop calls
/// on the owner context; `FileReady`, `DrainFailed` and `StreamLost` are
/// marshaled over from worker threads.
#[derive(Debug)]
pub enum CaptureEvent {
    Started,
    Stopped,
    FileReady { path: PathBuf },
    DrainFailed { error: DomainError },
    StreamLost { message: String },
}

pub type CaptureEventHandler = Box<dyn Fn(CaptureEvent) + Send + Sync>;

/// Bridges the real-time audio producer to a durable file consumer.
///
/// The producer side is the device callback: while the recording flag is
/// set it copies each hardware buffer into the signal queue; the first
/// callback after the flag clears pushes the end-of-stream marker, because
/// only the callback knows the true last frame. The consumer side is a
/// dedicated writer thread per session that drains the queue into a sink
/// and marshals its final result back to the owner context. The producer
/// is never blocked and the owner context never waits.
pub struct AudioCaptureSession {
    weak_self: Weak<AudioCaptureSession>,
    backend: Arc<dyn AudioBackend>,
    sinks: Arc<dyn SinkFactory>,
    marshal: Marshal,
    config: AudioConfig,

    queue: Arc<SignalQueue>,
    recording: Arc<AtomicBool>,
    previously_recording: Arc<AtomicBool>,

    stream_info: Mutex<Option<StreamInfo>>,
    current_device: Mutex<Option<String>>,
    session: Mutex<Option<RecordingSession>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    handler: Mutex<Option<Arc<CaptureEventHandler>>>,
}

impl AudioCaptureSession {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        sinks: Arc<dyn SinkFactory>,
        marshal: Marshal,
        config: AudioConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            backend,
            sinks,
            marshal,
            config,
            queue: Arc::new(SignalQueue::new()),
            recording: Arc::new(AtomicBool::new(false)),
            previously_recording: Arc::new(AtomicBool::new(false)),
            stream_info: Mutex::new(None),
            current_device: Mutex::new(None),
            session: Mutex::new(None),
            writer: Mutex::new(None),
            handler: Mutex::new(None),
        })
    }

    /// Register the single upstream event handler.
    pub fn set_event_handler(&self, handler: CaptureEventHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    fn emit(&self, event: CaptureEvent) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Open (or reopen) the input stream bound to `device`. Fails with
    /// `Busy` while a session exists; an open failure leaves the no-stream
    /// state behind.
    pub fn open_stream(&self, device: Option<&str>) -> Result<(), DomainError> {
        if self.session.lock().is_some() {
            return Err(DomainError::Busy);
        }
        self.backend.close_input();
        *self.stream_info.lock() = None;

        let queue = Arc::clone(&self.queue);
        let recording = Arc::clone(&self.recording);
        let previously = Arc::clone(&self.previously_recording);
        let mut seq = 0u64;
        let data: DataCallback = Box::new(move |samples: &[i16]| {
            // Runs on the driver's thread, once per hardware buffer.
            if recording.load(Ordering::Acquire) {
                queue.push(QueueItem::Frame(AudioFrame {
                    seq,
                    samples: samples.to_vec(),
                }));
                seq = seq.wrapping_add(1);
                previously.store(true, Ordering::Release);
            } else if previously.swap(false, Ordering::AcqRel) {
                // First buffer after a stop request: everything captured
                // while recording was active is already queued, so the
                // end-of-stream marker lands strictly after the last frame.
                queue.push(QueueItem::EndOfStream);
            }
        });

        let weak = self.weak_self.clone();
        let marshal = self.marshal.clone();
        let error: StreamErrorCallback = Box::new(move |message: String| {
            let weak = weak.clone();
            marshal.post(move || {
                if let Some(capture) = weak.upgrade() {
                    capture.on_stream_error(message);
                }
            });
        });

        let info = self.backend.open_input(device, self.config.channels, data, error)?;
        *self.stream_info.lock() = Some(info);
        *self.current_device.lock() = device.map(String::from);
        info!(
            ?device,
            sample_rate = info.sample_rate,
            channels = info.channels,
            "input stream open"
        );
        Ok(())
    }

    /// Begin a new recording session.
    pub fn start_recording(&self) -> Result<(), DomainError> {
        let info = *self.stream_info.lock();
        let info =
            info.ok_or_else(|| DomainError::DeviceUnavailable("no input stream open".to_string()))?;

        {
            let mut session = self.session.lock();
            if session.is_some() {
                return Err(DomainError::AlreadyRecording);
            }

            let residual = self.queue.clear();
            if residual > 0 {
                warn!(residual, "signal queue not empty at session start, discarding stale items");
            }

            let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
            let path = self.allocate_recording_path(id)?;
            let sink = self.sinks.create(&path, info.sample_rate, info.channels)?;

            let queue = Arc::clone(&self.queue);
            let marshal = self.marshal.clone();
            let weak = self.weak_self.clone();
            let handle = thread::Builder::new()
                .name(format!("rec-writer-{id}"))
                .spawn(move || {
                    let result = writer_loop(&queue, sink);
                    marshal.post(move || {
                        if let Some(capture) = weak.upgrade() {
                            capture.on_writer_done(result);
                        }
                    });
                })
                .map_err(|e| DomainError::Io(e.to_string()))?;

            *self.writer.lock() = Some(handle);
            *session = Some(RecordingSession {
                id,
                path,
                sample_rate: info.sample_rate,
                channels: info.channels,
                started_at: Instant::now(),
                state: SessionState::Capturing,
            });
        }

        self.recording.store(true, Ordering::Release);
        info!("recording started");
        self.emit(CaptureEvent::Started);
        Ok(())
    }

    /// Stop capturing and begin the drain.
    ///
    /// The end-of-stream marker is not pushed here: the next hardware
    /// callback does that, since it alone knows the last produced frame.
    pub fn stop_recording(&self) -> Result<(), DomainError> {
        {
            let mut session = self.session.lock();
            match session.as_mut() {
                Some(session) if session.state == SessionState::Capturing => {
                    session.state = SessionState::Draining;
                }
                _ => return Err(DomainError::NotRecording),
            }
        }
        self.recording.store(false, Ordering::Release);
        info!("recording stopped, draining");
        self.emit(CaptureEvent::Stopped);
        Ok(())
    }

    /// Swap the input device. Legal only while no session exists.
    pub fn set_device(&self, device: Option<&str>) -> Result<(), DomainError> {
        if self.session.lock().is_some() {
            return Err(DomainError::Busy);
        }
        self.open_stream(device)
    }

    pub fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        self.backend.list_input_devices()
    }

    pub fn current_device(&self) -> Option<String> {
        self.current_device.lock().clone()
    }

    /// A stream is open and no session is in progress.
    pub fn is_ready(&self) -> bool {
        self.stream_info.lock().is_some() && self.session.lock().is_none()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Release everything: stop the stream, flush the owed end-of-stream
    /// marker if the device never got another callback in, give the writer
    /// a bounded grace period, then discard whatever is left. Data loss
    /// here is accepted; this only runs at application teardown.
    pub fn shutdown(&self, grace: Duration) {
        self.recording.store(false, Ordering::Release);
        self.backend.close_input();
        *self.stream_info.lock() = None;

        // With the stream closed no further callbacks can run, so there is
        // no race on the flag: if a sentinel is still owed, push it here.
        // A session that never captured a frame owes one too, or its writer
        // would wait forever.
        let owed = self.previously_recording.swap(false, Ordering::AcqRel);
        let session_active = self
            .session
            .lock()
            .as_ref()
            .map(|s| s.state.is_active())
            .unwrap_or(false);
        if owed || session_active {
            self.queue.push(QueueItem::EndOfStream);
        }

        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            let deadline = Instant::now() + grace;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("recording writer still busy at shutdown, abandoning it");
            }
        }

        let discarded = self.queue.clear();
        if discarded > 0 {
            debug!(discarded, "discarded queued audio at shutdown");
        }
        self.session.lock().take();
        info!("audio capture shut down");
    }

    /// Runs on the owner context when the writer thread finishes.
    fn on_writer_done(&self, result: Result<(), DomainError>) {
        self.writer.lock().take();
        let session = self.session.lock().take();
        let Some(mut session) = session else {
            debug!("writer finished with no active session");
            return;
        };

        match result {
            Ok(()) => {
                session.state = SessionState::Finalized;
                info!(
                    path = ?session.path,
                    elapsed = ?session.started_at.elapsed(),
                    "recording file ready"
                );
                self.emit(CaptureEvent::FileReady { path: session.path });
            }
            Err(error) => {
                session.state = SessionState::Failed;
                // The writer may have died while frames were still being
                // produced; stop the producer and drop what it queued so
                // the next session starts clean.
                self.recording.store(false, Ordering::Release);
                self.queue.clear();
                warn!(%error, path = ?session.path, "recording drain failed");
                self.emit(CaptureEvent::DrainFailed { error });
            }
        }
    }

    /// Runs on the owner context after a stream-level failure.
    fn on_stream_error(&self, message: String) {
        warn!(%message, "input stream failed");
        self.recording.store(false, Ordering::Release);
        self.backend.close_input();
        *self.stream_info.lock() = None;

        // The dead stream will deliver no further callbacks, so flush the
        // end-of-stream marker on its behalf and let the writer finish
        // whatever made it into the queue.
        if self.previously_recording.swap(false, Ordering::AcqRel) {
            self.queue.push(QueueItem::EndOfStream);
        }
        self.emit(CaptureEvent::StreamLost { message });
    }

    fn allocate_recording_path(&self, id: u64) -> Result<PathBuf, DomainError> {
        let dir = self
            .config
            .recordings_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Ok(dir.join(format!("sayclip-{}-{}-{}.wav", std::process::id(), stamp, id)))
    }
}

/// Consumer side of the signal queue: append frames to the sink in FIFO
/// order until the end-of-stream marker, then finalize the file. On a write
/// error the partial file is left where it is.
fn writer_loop(queue: &SignalQueue, mut sink: Box<dyn RecordingSink>) -> Result<(), DomainError> {
    let mut frames = 0u64;
    loop {
        match queue.pop() {
            QueueItem::Frame(frame) => {
                sink.write_frame(&frame)?;
                frames += 1;
            }
            QueueItem::EndOfStream => {
                debug!(frames, "end of stream, finalizing recording");
                return sink.finalize();
            }
        }
    }
}
