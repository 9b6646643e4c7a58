//! Scene configuration
//!
//! A TOML file describes the playback parameters and the scene table:
//!
//! ```toml
//! sample_rate = 44100
//! fade_ms = 100
//! ahead_ms = 300
//! chunk_size = 1024
//!
//! [[ambience]]
//! label = "forest"
//! path = "audio/forest.ogg"
//!
//! [[music]]
//! label = "battle"
//! path = "audio/battle.ogg"
//! after = "forest"
//!
//! [[effect]]
//! label = "thunder"
//! path = "audio/thunder.ogg"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_sample_rate() -> u32 {
    44100
}

fn default_fade_ms() -> u64 {
    100
}

fn default_ahead_ms() -> u64 {
    300
}

fn default_chunk_size() -> u32 {
    1024
}

/// An ambience or effect entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    pub label: String,
    pub path: PathBuf,
}

/// A music entry; `after` names the ambience to return to.
#[derive(Debug, Clone, Deserialize)]
pub struct MusicEntry {
    pub label: String,
    pub path: PathBuf,
    #[serde(default)]
    pub after: Option<String>,
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Working sample rate; every scene source must match it.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Crossfade length for scene switches.
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,

    /// Splice margin for overlays, covering driver latency.
    #[serde(default = "default_ahead_ms")]
    pub ahead_ms: u64,

    /// Frames per driver callback.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Output device name; the default device when absent.
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default)]
    pub ambience: Vec<SceneEntry>,

    #[serde(default)]
    pub music: Vec<MusicEntry>,

    #[serde(default)]
    pub effect: Vec<SceneEntry>,
}

impl Config {
    /// Load and parse a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.fade_ms, 100);
        assert_eq!(config.ahead_ms, 300);
        assert_eq!(config.chunk_size, 1024);
        assert!(config.device.is_none());
        assert!(config.ambience.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            sample_rate = 48000
            fade_ms = 250
            device = "pipewire"

            [[ambience]]
            label = "forest"
            path = "audio/forest.ogg"

            [[music]]
            label = "battle"
            path = "audio/battle.ogg"
            after = "forest"

            [[effect]]
            label = "thunder"
            path = "audio/thunder.ogg"
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.fade_ms, 250);
        assert_eq!(config.device.as_deref(), Some("pipewire"));
        assert_eq!(config.ambience.len(), 1);
        assert_eq!(config.music[0].after.as_deref(), Some("forest"));
        assert_eq!(config.effect[0].label, "thunder");
    }

    #[test]
    fn test_music_after_is_optional() {
        let config = Config::parse(
            r#"
            [[music]]
            label = "anthem"
            path = "anthem.ogg"
            "#,
        )
        .unwrap();
        assert!(config.music[0].after.is_none());
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        assert!(matches!(
            Config::parse("sample_rate = \"fast\""),
            Err(Error::Config(_))
        ));
    }
}
