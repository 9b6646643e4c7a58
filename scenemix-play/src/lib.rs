//! # SceneMix Player (scenemix-play)
//!
//! Realtime side of SceneMix: the lock-free [`Stream`] that feeds an audio
//! driver from a swappable [`Source`](scenemix_engine::Source), the cpal
//! device binding, the symphonia file loader, and the [`Controller`] that
//! turns symbolic scene labels into timeline mutations.
//!
//! Thread model: the audio driver owns a realtime callback that only ever
//! performs one atomic add and reads one source slot; everything that
//! allocates, loads or logs happens on the control thread and is published
//! through the stream's compare-and-swap slot flip.

pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod output;
pub mod stream;

pub use config::Config;
pub use controller::{ActionGroup, ActionKind, Controller};
pub use error::{Error, Result};
pub use loader::load_source;
pub use output::AudioOutput;
pub use stream::{Stream, StreamRenderer};
