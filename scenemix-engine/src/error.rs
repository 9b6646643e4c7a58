//! Error types for scenemix-engine
//!
//! Region validation failures are reported synchronously from
//! [`Session::add_region`](crate::session::Session::add_region); renderer
//! I/O failures propagate from the WAV writer. Programmer errors (rewinding
//! a forgetful session, mixing into a malformed buffer pair) panic instead;
//! they are contract violations, not recoverable conditions.

use thiserror::Error;

/// Main error type for the engine crate
#[derive(Error, Debug)]
pub enum Error {
    /// Region source sample rate differs from the session's
    #[error("source sample rate {source_rate} Hz differs from session rate {session_rate} Hz")]
    SampleRateMismatch { source_rate: i64, session_rate: i64 },

    /// Region source has a channel count the mixer does not support
    #[error("unsupported channel count {0} (only mono and stereo sources are mixed)")]
    UnsupportedChannels(usize),

    /// Region offset lies outside its source
    #[error("region offset {offset} outside source of {source_len} frames")]
    InvalidOffset { offset: i64, source_len: i64 },

    /// Region length does not fit in its source window
    #[error("region length {length} does not fit source window ({available} frames available)")]
    InvalidLength { length: i64, available: i64 },

    /// Fade duration is negative or exceeds the region
    #[error("invalid fade: fade_in={fade_in}, fade_out={fade_out}, region length {length}")]
    InvalidFade { fade_in: i64, fade_out: i64, length: i64 },

    /// Renderer sink failures
    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
