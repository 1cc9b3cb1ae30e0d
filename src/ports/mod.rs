pub mod audio;
pub mod config;
pub mod output;
pub mod sink;
pub mod speech;

pub use audio::{AudioBackend, DataCallback, StreamErrorCallback, StreamInfo};
pub use config::ConfigStore;
pub use output::TextOutput;
pub use sink::{RecordingSink, SinkFactory};
pub use speech::SpeechEngine;
