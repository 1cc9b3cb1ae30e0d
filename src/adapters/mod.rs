pub mod audio_cpal;
pub mod clipboard;
pub mod config_store;
pub mod wav_sink;
pub mod whisper_cpp;

pub use audio_cpal::CpalBackend;
pub use clipboard::ClipboardOutput;
pub use config_store::TomlConfigStore;
pub use wav_sink::{WavFileSink, WavSinkFactory};
pub use whisper_cpp::WhisperCppEngine;
