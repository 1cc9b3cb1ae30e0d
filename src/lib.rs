#![forbid(unsafe_code)]

//! Local voice dictation core: capture microphone audio, transcribe it with
//! a speech model, hand the text to the embedding UI.
//!
//! The crate is organised hexagonally: `domain` holds the data model and
//! state machine, `ports` the trait seams to the platform (audio input,
//! speech model, sinks, config, output), `adapters` the cpal / whisper /
//! hound / arboard implementations, `runtime` the cross-thread marshaling
//! and task-running primitives, and `app` the coordinators that tie them
//! together under a single owner context.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use app::DictationController;
pub use domain::{AppConfig, AppState, CoreEvent, DomainError};
pub use runtime::{Marshal, MarshalPump};
