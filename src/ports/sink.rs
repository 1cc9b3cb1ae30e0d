use std::path::Path;

use crate::domain::{AudioFrame, DomainError};

/// Streaming destination for captured frames.
///
/// One sink exists per recording session and is driven only by the writer
/// thread; frames arrive in queue order.
pub trait RecordingSink: Send {
    fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), DomainError>;

    /// Flush and close the destination.
    fn finalize(self: Box<Self>) -> Result<(), DomainError>;
}

/// Builds the sink for a new session from the stream parameters at
/// record-start time.
pub trait SinkFactory: Send + Sync {
    fn create(
        &self,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn RecordingSink>, DomainError>;
}
