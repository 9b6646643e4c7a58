//! The `Source` capability and its in-memory implementation
//!
//! A [`Source`] yields PCM samples for an arbitrary `(channel, offset,
//! length)` window. [`MemSource`] serves them straight out of per-channel
//! arrays; [`Session`](crate::session::Session) mixes its region list on
//! demand and is therefore a recursive source.

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::session::Session;
use crate::time::Tz;

/// A shareable source handle.
///
/// Sources are immutable after construction as far as their audio content is
/// concerned, so one source may appear in any number of sessions (and in
/// both stream slots) simultaneously.
pub type SharedSource = Arc<dyn Source>;

/// Anything that can yield PCM samples for a window of itself.
///
/// Contract for [`samples`](Source::samples): `0 <= channel <
/// num_channels()` and `0 <= offset`, `offset + length <= length()`. The
/// slice handed to `sink` may borrow the source's internal storage and is
/// only valid for the duration of the call; copy it out if it must outlive
/// the callback.
pub trait Source: Send + Sync {
    /// Sample frames per second.
    fn sample_rate(&self) -> Tz;

    /// Number of channels, 1 (mono) or 2 (stereo).
    fn num_channels(&self) -> usize;

    /// Total length in sample frames.
    fn length(&self) -> Tz;

    /// Hand `length` samples of `channel` starting at `offset` to `sink`.
    fn samples(&self, channel: usize, offset: Tz, length: Tz, sink: &mut dyn FnMut(&[f32]));

    /// Downcast hook for timeline sources.
    ///
    /// The effect splice inspects the currently playing source and, when it
    /// is a live session, overlays onto a clone of it instead of starting a
    /// timeline from scratch.
    fn as_session(&self) -> Option<&Session> {
        None
    }
}

/// A source backed by per-channel sample arrays in memory.
///
/// Invariant: every channel buffer has the same length. The loader upholds
/// this when decoding files; hand-built instances (tests, generated tones)
/// must as well.
#[derive(Debug, Clone, Default)]
pub struct MemSource {
    /// One buffer per channel, deinterleaved.
    pub data: Vec<Buffer>,
    /// Sample frames per second.
    pub rate: Tz,
}

impl MemSource {
    /// Create a source from deinterleaved channel data.
    ///
    /// # Panics
    /// Panics if the channel buffers differ in length.
    pub fn new(data: Vec<Buffer>, rate: Tz) -> Self {
        if let Some(first) = data.first() {
            assert!(
                data.iter().all(|c| c.len() == first.len()),
                "channel buffers must have identical length"
            );
        }
        MemSource { data, rate }
    }
}

impl Source for MemSource {
    fn sample_rate(&self) -> Tz {
        self.rate
    }

    fn num_channels(&self) -> usize {
        self.data.len()
    }

    fn length(&self) -> Tz {
        self.data.first().map_or(0, |c| c.len() as Tz)
    }

    fn samples(&self, channel: usize, offset: Tz, length: Tz, sink: &mut dyn FnMut(&[f32])) {
        let beg = offset as usize;
        let end = (offset + length) as usize;
        sink(&self.data[channel][beg..end]);
    }
}
