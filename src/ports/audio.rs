use crate::domain::{AudioDevice, DomainError};

/// Samples delivered by the device, already downmixed to the requested
/// channel layout in the stream's native sample rate. Runs on the driver's
/// schedule and must return quickly.
pub type DataCallback = Box<dyn FnMut(&[i16]) + Send>;

/// Stream-level failures (device unplugged, driver errors). May fire on any
/// thread.
pub type StreamErrorCallback = Box<dyn FnMut(String) + Send>;

/// Properties of an open input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Port for the platform audio input.
///
/// At most one stream is open at a time; opening a new one closes the
/// previous stream first. Implementations handle device resolution and
/// sample-format conversion.
pub trait AudioBackend: Send + Sync {
    /// Open an input stream bound to `device` (None for the system
    /// default). The data callback receives each hardware buffer.
    fn open_input(
        &self,
        device: Option<&str>,
        channels: u16,
        data: DataCallback,
        error: StreamErrorCallback,
    ) -> Result<StreamInfo, DomainError>;

    /// Close the open stream, if any. No callbacks fire after this returns.
    fn close_input(&self);

    fn is_open(&self) -> bool;

    /// List available audio input devices with stable unique ids.
    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError>;
}
