use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::domain::DomainError;
use crate::ports::SpeechEngine;

/// Whisper expects 16 kHz mono f32 input.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Model names whisper.cpp ships ggml weights for.
static MODEL_CATALOG: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "tiny", "tiny.en", "base", "base.en", "small", "small.en", "medium", "medium.en", "large",
    ]
});

/// Speech engine backed by whisper.cpp via whisper-rs.
///
/// Models are local `ggml-<name>.bin` files under the models directory.
/// Both operations block; they are only ever called from task-runner
/// worker threads.
pub struct WhisperCppEngine {
    models_dir: PathBuf,
    threads: u32,
    language: Option<String>,
    context: RwLock<Option<Arc<WhisperContext>>>,
}

impl WhisperCppEngine {
    /// `threads` = 0 auto-detects (cores - 1).
    pub fn new(models_dir: PathBuf, threads: u32, language: Option<String>) -> Self {
        let actual_threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|p| std::cmp::max(1, p.get() as u32 - 1))
                .unwrap_or(1)
        } else {
            threads
        };

        info!(models_dir = ?models_dir, threads = actual_threads, "whisper engine created");
        Self {
            models_dir,
            threads: actual_threads,
            language,
            context: RwLock::new(None),
        }
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{name}.bin"))
    }

    /// Read a recording back as 16 kHz mono f32 samples.
    fn read_recording(path: &Path) -> Result<Vec<f32>, DomainError> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| DomainError::Transcription(format!("failed to open recording: {e}")))?;
        let spec = reader.spec();

        let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
        let samples =
            samples.map_err(|e| DomainError::Transcription(format!("failed to read samples: {e}")))?;

        let mono = downmix(&samples, spec.channels as usize);
        let resampled = resample(&mono, spec.sample_rate, WHISPER_SAMPLE_RATE);
        Ok(convert_samples(&resampled))
    }
}

impl SpeechEngine for WhisperCppEngine {
    fn load(&self, name: &str) -> Result<(), DomainError> {
        // Drop any previous model first: a failed load must leave nothing
        // loaded.
        self.context.write().take();

        let path = self.model_path(name);
        if !path.exists() {
            return Err(DomainError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        info!(model = name, path = ?path, "loading whisper model");
        let path_str = path.to_string_lossy().to_string();
        let ctx = WhisperContext::new_with_params(&path_str, WhisperContextParameters::default())
            .map_err(|e| DomainError::ModelLoad(e.to_string()))?;

        *self.context.write() = Some(Arc::new(ctx));
        info!(model = name, "whisper model loaded");
        Ok(())
    }

    fn transcribe(&self, path: &Path) -> Result<String, DomainError> {
        let ctx = self.context.read().clone().ok_or(DomainError::NoModelLoaded)?;

        let samples = Self::read_recording(path)?;
        if samples.is_empty() {
            return Ok(String::new());
        }
        debug!(
            path = ?path,
            samples = samples.len(),
            threads = self.threads,
            "starting transcription"
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads as i32);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        if let Some(ref lang) = self.language {
            params.set_language(Some(lang.as_str()));
        }

        let mut state = ctx
            .create_state()
            .map_err(|e| DomainError::Transcription(format!("failed to create state: {e}")))?;
        state
            .full(params, &samples)
            .map_err(|e| DomainError::Transcription(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| DomainError::Transcription(format!("failed to get segments: {e}")))?;

        let mut text = String::new();
        for i in 0..num_segments {
            if let Ok(segment) = state.full_get_segment_text(i) {
                text.push_str(&segment);
            }
        }

        Ok(text.trim().to_string())
    }

    fn available_models(&self) -> Vec<String> {
        // Catalog names first, then anything else sitting in the models
        // directory under the ggml naming scheme.
        let mut models: Vec<String> = MODEL_CATALOG.iter().map(|s| s.to_string()).collect();

        let mut extra = BTreeSet::new();
        if let Ok(entries) = fs::read_dir(&self.models_dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if let Some(name) = file_name
                    .strip_prefix("ggml-")
                    .and_then(|n| n.strip_suffix(".bin"))
                {
                    if !MODEL_CATALOG.contains(&name) {
                        extra.insert(name.to_string());
                    }
                }
            }
        }
        models.extend(extra);
        models
    }

    fn is_loaded(&self) -> bool {
        self.context.read().is_some()
    }
}

/// Convert i16 samples to f32 in [-1, 1] (whisper's expected range).
fn convert_samples(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

fn downmix(samples: &[i16], channels: usize) -> Vec<i16> {
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

/// Linear-interpolation resampler, good enough for speech input.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = src_pos.fract();

        let sample = if src_idx + 1 < samples.len() {
            let s0 = samples[src_idx] as f64;
            let s1 = samples[src_idx + 1] as f64;
            (s0 + (s1 - s0) * frac) as i16
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0
        };
        output.push(sample);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_naming() {
        let engine = WhisperCppEngine::new(PathBuf::from("/models"), 4, None);
        assert_eq!(
            engine.model_path("base.en"),
            PathBuf::from("/models/ggml-base.en.bin")
        );
    }

    #[test]
    fn test_load_missing_model_fails_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WhisperCppEngine::new(dir.path().to_path_buf(), 4, None);
        assert!(matches!(
            engine.load("base"),
            Err(DomainError::ModelLoad(_))
        ));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_transcribe_without_model() {
        let engine = WhisperCppEngine::new(PathBuf::from("/models"), 4, None);
        assert!(matches!(
            engine.transcribe(Path::new("/tmp/rec.wav")),
            Err(DomainError::NoModelLoaded)
        ));
    }

    #[test]
    fn test_available_models_includes_catalog_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ggml-custom-ft.bin"), b"weights").unwrap();
        fs::write(dir.path().join("ggml-base.bin"), b"weights").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let engine = WhisperCppEngine::new(dir.path().to_path_buf(), 4, None);
        let models = engine.available_models();
        assert!(models.contains(&"base".to_string()));
        assert!(models.contains(&"custom-ft".to_string()));
        assert_eq!(models.iter().filter(|m| *m == "base").count(), 1);
        assert!(!models.contains(&"notes".to_string()));
    }

    #[test]
    fn test_convert_samples_range() {
        let converted = convert_samples(&[0, 16384, -16384, 32767, -32768]);
        assert!((converted[0] - 0.0).abs() < 0.001);
        assert!((converted[1] - 0.5).abs() < 0.001);
        assert!((converted[2] + 0.5).abs() < 0.001);
        assert!((converted[3] - 1.0).abs() < 0.001);
        assert!((converted[4] + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![100, 200, 300, 400];
        assert_eq!(resample(&samples, 48_000, 48_000), samples);
    }

    #[test]
    fn test_resample_downsample_length() {
        let samples: Vec<i16> = (0..48).map(|i| i * 100).collect();
        let result = resample(&samples, 48_000, 16_000);
        assert!(result.len() >= 15 && result.len() <= 17);
    }

    #[test]
    fn test_read_recording_resamples_to_whisper_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..48_000 {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();

        let samples = WhisperCppEngine::read_recording(&path).unwrap();
        // One second of audio lands near 16k samples after resampling.
        assert!(samples.len() >= 15_900 && samples.len() <= 16_100);
        assert!((samples[100] - 1000.0 / 32768.0).abs() < 0.01);
    }
}
