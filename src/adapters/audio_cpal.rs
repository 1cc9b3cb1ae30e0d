use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{AudioDevice, DomainError};
use crate::ports::{AudioBackend, DataCallback, StreamErrorCallback, StreamInfo};

/// Commands sent to the stream-owning thread.
enum BackendCommand {
    Open {
        device: Option<String>,
        channels: u16,
        data: DataCallback,
        error: StreamErrorCallback,
        reply: oneshot::Sender<Result<StreamInfo, DomainError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// cpal-based audio input.
///
/// cpal streams are !Send, so a dedicated thread owns the open stream and
/// everything else talks to it through a command channel. At most one
/// stream is open at a time; callers receive mono i16 buffers at the
/// device's native sample rate.
pub struct CpalBackend {
    cmd_tx: mpsc::Sender<BackendCommand>,
    open: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalBackend {
    pub fn new() -> Result<Self, DomainError> {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let open = Arc::new(AtomicBool::new(false));

        let thread_open = Arc::clone(&open);
        let thread = thread::Builder::new()
            .name("audio-io".to_string())
            .spawn(move || stream_thread_main(cmd_rx, thread_open))
            .map_err(|e| DomainError::DeviceUnavailable(format!("failed to spawn audio thread: {e}")))?;

        info!("cpal audio backend initialized");
        Ok(Self {
            cmd_tx,
            open,
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.cmd_tx.blocking_send(BackendCommand::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open_input(
        &self,
        device: Option<&str>,
        channels: u16,
        data: DataCallback,
        error: StreamErrorCallback,
    ) -> Result<StreamInfo, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .blocking_send(BackendCommand::Open {
                device: device.map(String::from),
                channels,
                data,
                error,
                reply: reply_tx,
            })
            .map_err(|_| DomainError::DeviceUnavailable("audio thread not running".to_string()))?;
        reply_rx
            .blocking_recv()
            .map_err(|_| DomainError::DeviceUnavailable("audio thread did not respond".to_string()))?
    }

    fn close_input(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .blocking_send(BackendCommand::Close { reply: reply_tx })
            .is_ok()
        {
            let _ = reply_rx.blocking_recv();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host.input_devices().map_err(|e| {
            DomainError::DeviceUnavailable(format!("failed to enumerate devices: {e}"))
        })?;

        let mut result = Vec::new();
        let mut name_counts: HashMap<String, usize> = HashMap::new();
        for device in devices {
            if let Ok(name) = device.name() {
                // Duplicate names get an index suffix so ids stay unique.
                let count = name_counts.entry(name.clone()).or_insert(0);
                let id = if *count == 0 {
                    name.clone()
                } else {
                    format!("{}:{}", name, count)
                };
                *count += 1;

                result.push(AudioDevice {
                    id,
                    is_default: Some(&name) == default_name.as_ref(),
                    name,
                });
            }
        }

        debug!(count = result.len(), "listed input devices");
        Ok(result)
    }
}

/// Runs on the dedicated audio thread; the open Stream lives here.
fn stream_thread_main(mut cmd_rx: mpsc::Receiver<BackendCommand>, open: Arc<AtomicBool>) {
    let mut stream: Option<Stream> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            BackendCommand::Open {
                device,
                channels,
                data,
                error,
                reply,
            } => {
                stream.take();
                open.store(false, Ordering::Release);

                let result = open_stream(device.as_deref(), channels, data, error);
                let result = match result {
                    Ok((new_stream, info)) => {
                        stream = Some(new_stream);
                        open.store(true, Ordering::Release);
                        Ok(info)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            BackendCommand::Close { reply } => {
                stream.take();
                open.store(false, Ordering::Release);
                let _ = reply.send(());
            }
            BackendCommand::Shutdown => break,
        }
    }
    debug!("audio thread shutting down");
}

fn open_stream(
    device_id: Option<&str>,
    channels: u16,
    mut data: DataCallback,
    mut error: StreamErrorCallback,
) -> Result<(Stream, StreamInfo), DomainError> {
    if channels != 1 {
        return Err(DomainError::DeviceUnavailable(format!(
            "only mono capture is supported, {channels} channels requested"
        )));
    }

    let device = resolve_device(device_id)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device.default_input_config().map_err(|e| {
        DomainError::DeviceUnavailable(format!("failed to get default config: {e}"))
    })?;
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let device_channels = config.channels as usize;

    debug!(
        device = %device_name,
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        format = ?supported.sample_format(),
        "device default config"
    );

    let stream = match supported.sample_format() {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |chunk: &[i16], _: &cpal::InputCallbackInfo| {
                let mono = downmix_to_mono(chunk, device_channels);
                data(&mono);
            },
            move |err| {
                error!(?err, "audio stream error");
                error(err.to_string());
            },
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |chunk: &[f32], _: &cpal::InputCallbackInfo| {
                let converted = convert_f32_to_i16(chunk);
                let mono = downmix_to_mono(&converted, device_channels);
                data(&mono);
            },
            move |err| {
                error!(?err, "audio stream error");
                error(err.to_string());
            },
            None,
        ),
        other => {
            return Err(DomainError::DeviceUnavailable(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| DomainError::DeviceUnavailable(format!("failed to build stream: {e}")))?;

    stream
        .play()
        .map_err(|e| DomainError::DeviceUnavailable(format!("failed to start stream: {e}")))?;

    info!(device = %device_name, "input stream started");
    Ok((
        stream,
        StreamInfo {
            sample_rate: config.sample_rate.0,
            channels: 1,
        },
    ))
}

fn resolve_device(device_id: Option<&str>) -> Result<Device, DomainError> {
    let host = cpal::default_host();

    if let Some(id) = device_id {
        // Ids are the enumeration scheme from list_input_devices: the name,
        // with ":<index>" appended for duplicates.
        let base_name = id.split(':').next().unwrap_or(id);
        let devices = host.input_devices().map_err(|e| {
            DomainError::DeviceUnavailable(format!("failed to enumerate devices: {e}"))
        })?;
        for device in devices {
            if let Ok(name) = device.name() {
                if name == id || name == base_name {
                    return Ok(device);
                }
            }
        }
        warn!(device_id = %id, "selected device not found, falling back to default");
    }

    host.default_input_device()
        .ok_or_else(|| DomainError::DeviceUnavailable("no default input device available".to_string()))
}

fn convert_f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_f32_to_i16_clamps() {
        let converted = convert_f32_to_i16(&[0.0, 0.5, -0.5, 1.5, -1.5]);
        assert_eq!(converted[0], 0);
        assert_eq!(converted[1], 16383);
        assert_eq!(converted[2], -16383);
        assert_eq!(converted[3], 32767);
        assert_eq!(converted[4], -32767);
    }

    #[test]
    fn test_downmix_stereo_averages_pairs() {
        let mono = downmix_to_mono(&[100, 200, -100, 100], 2);
        assert_eq!(mono, vec![150, 0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![1, 2, 3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }
}
