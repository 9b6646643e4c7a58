//! Sample-frame time utilities
//!
//! The engine measures all time in sample frames, not wall-clock units.
//! Conversions happen once, at the boundary, and always through this module.

use std::time::Duration;

use crate::source::Source;

/// Time expressed as a count of sample frames.
///
/// Signed so that positions before the nominal timeline origin are
/// representable (a region may be scheduled partially in the past).
pub type Tz = i64;

/// Convert a wall-clock duration to sample frames at the given rate.
///
/// Truncates toward zero; at 44.1 kHz one frame is ~22.7 µs, well below
/// anything audible.
pub fn duration_to_tz(d: Duration, sample_rate: Tz) -> Tz {
    (d.as_nanos() as i128 * sample_rate as i128 / 1_000_000_000) as Tz
}

/// Duration of `length` frames at `sample_rate`.
pub fn tz_to_duration(length: Tz, sample_rate: Tz) -> Duration {
    debug_assert!(sample_rate > 0);
    Duration::from_nanos((length.max(0) as u128 * 1_000_000_000 / sample_rate as u128) as u64)
}

/// Playable duration of a source according to its own sample rate.
pub fn source_duration(source: &dyn Source) -> Duration {
    tz_to_duration(source.length(), source.sample_rate())
}
