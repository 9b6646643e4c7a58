//! # SceneMix Engine (scenemix-engine)
//!
//! Timeline composition and mixing core.
//!
//! **Purpose:** Compose overlapping audio clip placements ("regions") into a
//! stereo mix, on demand, for any window of the timeline. A [`Session`] is
//! itself a [`Source`], so timelines nest: a running mix can be wrapped into
//! a new timeline that fades it out while the replacement fades in.
//!
//! **Architecture:** pull-based. Nothing is rendered until a consumer asks
//! for a sample window; the [`Session`] mixer resolves its region list
//! incrementally as its cursor advances, and prepared regions carry
//! precomputed pan gains and squared fade endpoints so the inner loop is a
//! handful of fused multiply-accumulate passes.
//!
//! All time inside the engine is measured in sample frames ([`Tz`]).
//! Wall-clock durations are converted once, at the boundary.

pub mod buffer;
pub mod error;
pub mod mutator;
pub mod pan;
pub mod session;
pub mod source;
pub mod time;
pub mod wav;

pub use buffer::Buffer;
pub use error::{Error, Result};
pub use mutator::{Ambience, Effect, Music, SourceMutator};
pub use pan::GainMatrix;
pub use session::{Region, Session};
pub use source::{MemSource, SharedSource, Source};
pub use time::{duration_to_tz, source_duration, Tz};
