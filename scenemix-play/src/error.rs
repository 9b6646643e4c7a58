//! Error types for scenemix-play

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the player crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or parsing errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A controller action referencing an unknown label
    #[error("action not found: {0}")]
    NotFound(String),

    /// A music action whose follow-up ambience cannot be resolved
    #[error("ambience '{label}' not found (follow-up for music '{music}')")]
    AmbienceNotFound { label: String, music: String },

    /// A registered scene source the mixer cannot accept
    #[error("unusable source for '{label}': {reason}")]
    BadSource { label: String, reason: String },

    /// Audio device errors
    #[error("audio output error: {0}")]
    AudioOutput(String),

    /// File open failures during load
    #[error("file read error: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decode failures (unsupported codec, corrupt stream)
    #[error("decode error: {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Errors bubbling up from the engine
    #[error(transparent)]
    Engine(#[from] scenemix_engine::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
