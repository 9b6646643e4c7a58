//! Scene controller
//!
//! Maps symbolic labels onto timeline mutations. Three tables:
//!
//! - **ambience**: looping beds; switching crossfades from whatever plays.
//! - **music**: one-shot clips that crossfade in, play out, and hand over
//!   to a follow-up ambience (explicit `after`, or whatever bed was last
//!   active).
//! - **effect**: one-shots overlaid on top of the running timeline.
//!
//! `action` resolves a label with effect > music > ambience priority and
//! returns the mutator to hand to [`Stream::switch`](crate::Stream::switch).
//! The controller never touches the stream itself; it only builds mutators.

use std::collections::HashMap;

use tracing::{debug, info};

use scenemix_engine::{Ambience, Effect, Music, SharedSource, Source, SourceMutator, Tz};

use crate::error::{Error, Result};

/// Kind of a controllable action, for grouped listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Effect,
    Music,
    Ambience,
}

/// One listing group: all labels of one kind, sorted.
#[derive(Debug, Clone)]
pub struct ActionGroup {
    pub kind: ActionKind,
    pub labels: Vec<String>,
}

struct MusicEntry {
    source: SharedSource,
    after: Option<String>,
}

/// Label → mutator factory with "last ambience" context.
pub struct Controller {
    sample_rate: Tz,
    fade: Tz,
    ahead: Tz,
    chunk_size: Tz,

    ambience: HashMap<String, SharedSource>,
    music: HashMap<String, MusicEntry>,
    effect: HashMap<String, SharedSource>,

    last_ambience: Option<String>,
}

impl Controller {
    /// `fade` is the crossfade length and `ahead` the splice margin for
    /// overlays, both in frames; `chunk_size` is the stream's callback
    /// chunk, used to pre-size mutator scratch buffers.
    pub fn new(sample_rate: Tz, fade: Tz, ahead: Tz, chunk_size: Tz) -> Self {
        Controller {
            sample_rate,
            fade,
            ahead,
            chunk_size,
            ambience: HashMap::new(),
            music: HashMap::new(),
            effect: HashMap::new(),
            last_ambience: None,
        }
    }

    fn check_source(&self, label: &str, source: &SharedSource) -> Result<()> {
        if source.sample_rate() != self.sample_rate {
            return Err(Error::BadSource {
                label: label.to_string(),
                reason: format!(
                    "sample rate {} Hz differs from controller rate {} Hz",
                    source.sample_rate(),
                    self.sample_rate
                ),
            });
        }
        let channels = source.num_channels();
        if channels < 1 || channels > 2 {
            return Err(Error::BadSource {
                label: label.to_string(),
                reason: format!("{} channels (only mono and stereo are mixed)", channels),
            });
        }
        Ok(())
    }

    /// Register an ambience bed.
    pub fn add_ambience(&mut self, label: impl Into<String>, source: SharedSource) -> Result<()> {
        let label = label.into();
        self.check_source(&label, &source)?;
        info!(%label, frames = source.length(), "ambience registered");
        self.ambience.insert(label, source);
        Ok(())
    }

    /// Register a music clip, optionally naming the ambience to return to.
    pub fn add_music(
        &mut self,
        label: impl Into<String>,
        source: SharedSource,
        after: Option<String>,
    ) -> Result<()> {
        let label = label.into();
        self.check_source(&label, &source)?;
        info!(%label, frames = source.length(), after = ?after, "music registered");
        self.music.insert(label, MusicEntry { source, after });
        Ok(())
    }

    /// Register a one-shot effect.
    pub fn add_effect(&mut self, label: impl Into<String>, source: SharedSource) -> Result<()> {
        let label = label.into();
        self.check_source(&label, &source)?;
        info!(%label, frames = source.length(), "effect registered");
        self.effect.insert(label, source);
        Ok(())
    }

    /// All registered actions, grouped by kind for UI listings.
    pub fn actions(&self) -> Vec<ActionGroup> {
        let group = |kind, table: Vec<&String>| {
            let mut labels: Vec<String> = table.into_iter().cloned().collect();
            labels.sort();
            ActionGroup { kind, labels }
        };
        vec![
            group(ActionKind::Effect, self.effect.keys().collect()),
            group(ActionKind::Music, self.music.keys().collect()),
            group(ActionKind::Ambience, self.ambience.keys().collect()),
        ]
    }

    /// Build the mutator for `label`.
    ///
    /// Dispatch priority is effect, then music, then ambience; the first
    /// table containing the label wins. Music without an explicit follow-up
    /// returns to the last ambience that was (or is about to be) playing.
    pub fn action(&mut self, label: &str) -> Result<Box<dyn SourceMutator>> {
        if let Some(effect) = self.effect.get(label) {
            debug!(%label, "effect action");
            return Ok(Box::new(Effect::new(
                effect.clone(),
                self.fade,
                self.ahead,
                self.chunk_size,
            )));
        }

        if let Some(entry) = self.music.get(label) {
            let after = entry
                .after
                .clone()
                .or_else(|| self.last_ambience.clone())
                .ok_or_else(|| Error::AmbienceNotFound {
                    label: "<none playing>".to_string(),
                    music: label.to_string(),
                })?;
            let next = self
                .ambience
                .get(&after)
                .ok_or_else(|| Error::AmbienceNotFound {
                    label: after.clone(),
                    music: label.to_string(),
                })?
                .clone();

            debug!(%label, %after, "music action");
            let mutator = Music::new(entry.source.clone(), next, self.fade, self.chunk_size);
            // The follow-up bed becomes the ambience context.
            self.last_ambience = Some(after);
            return Ok(Box::new(mutator));
        }

        if let Some(bed) = self.ambience.get(label) {
            debug!(%label, "ambience action");
            let mutator = Ambience::new(bed.clone(), self.fade, self.chunk_size);
            self.last_ambience = Some(label.to_string());
            return Ok(Box::new(mutator));
        }

        Err(Error::NotFound(label.to_string()))
    }
}
