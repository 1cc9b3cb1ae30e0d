pub mod capture;
pub mod controller;
pub mod transcription;

pub use capture::{AudioCaptureSession, CaptureEvent};
pub use controller::DictationController;
pub use transcription::{SpeechEvent, TranscriptionCoordinator};
