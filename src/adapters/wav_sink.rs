use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use crate::domain::{AudioFrame, DomainError};
use crate::ports::{RecordingSink, SinkFactory};

/// Streaming WAV encoder: simple header plus linear PCM body, parameters
/// taken from the open stream at record-start time.
pub struct WavFileSink {
    writer: WavWriter<BufWriter<File>>,
}

impl WavFileSink {
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, DomainError> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        debug!(?path, sample_rate, channels, "recording file created");
        Ok(Self { writer })
    }
}

impl RecordingSink for WavFileSink {
    fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), DomainError> {
        for &sample in &frame.samples {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), DomainError> {
        self.writer.finalize()?;
        Ok(())
    }
}

/// Produces a `WavFileSink` per recording session.
pub struct WavSinkFactory;

impl SinkFactory for WavSinkFactory {
    fn create(
        &self,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn RecordingSink>, DomainError> {
        Ok(Box::new(WavFileSink::create(path, sample_rate, channels)?))
    }
}
