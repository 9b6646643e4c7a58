//! Timeline mixer
//!
//! A [`Session`] holds an ordered collection of prepared regions and mixes
//! them into stereo on demand. It implements [`Source`], so a session can be
//! placed on another session's timeline like any clip. That is how a
//! running mix gets faded out underneath its replacement.
//!
//! A user-facing [`Region`] is validated once and decomposed into at most
//! three immutable prepared pieces (fade-in, flat body, fade-out), each with
//! a constant gain shape and precomputed pan gains, so the per-window inner
//! loop is nothing but fused multiply-accumulate passes.
//!
//! Sessions are not thread-safe in the ensemble sense: finish adding regions
//! before publishing one to the realtime consumer. Interior state sits
//! behind a mutex so the recursive source graph can be walked through
//! shared handles; on the realtime path that lock is never contended.

use std::sync::Mutex;

use tracing::trace;

use crate::buffer::{self, Buffer};
use crate::error::{Error, Result};
use crate::pan::{gain_matrix, GainMatrix};
use crate::source::{SharedSource, Source};
use crate::time::Tz;

/// Sessions always mix down to stereo.
pub const NUM_CHANNELS: usize = 2;

/// A placement of (part of) a source on the timeline.
///
/// `length == 0` means "to the end of the source". Fades must fit inside the
/// played window: `fade_in + fade_out <= length`.
#[derive(Clone)]
pub struct Region {
    /// Audio to play.
    pub source: SharedSource,
    /// Timeline position where playback starts, in session frames.
    pub begin: Tz,
    /// Window start within the source.
    pub offset: Tz,
    /// Window length within the source; 0 plays to the end.
    pub length: Tz,
    /// Linear volume gain, >= 0.
    pub volume: f32,
    /// Stereo pan in [-1, +1].
    pub pan: f32,
    /// Fade-in length in frames.
    pub fade_in: Tz,
    /// Fade-out length in frames.
    pub fade_out: Tz,
}

impl Region {
    /// Region playing the whole of `source` at `begin`, full volume,
    /// centered, no fades.
    pub fn new(source: SharedSource, begin: Tz) -> Self {
        Region {
            source,
            begin,
            offset: 0,
            length: 0,
            volume: 1.0,
            pan: 0.0,
            fade_in: 0,
            fade_out: 0,
        }
    }
}

/// Immutable region piece with precomputed mixing parameters.
///
/// `vol_beg == vol_end` is a flat piece; otherwise the gain follows an
/// equal-power sqrt ramp between the two (squared at mix time). The pan
/// matrix is cached here so the mix loop never computes trigonometry.
#[derive(Clone)]
pub(crate) struct PreparedRegion {
    pub src: Option<SharedSource>,
    pub beg: Tz,
    pub end: Tz,
    pub off: Tz,
    pub vol_beg: f32,
    pub vol_end: f32,
    pub pan: f32,
    pub gains: GainMatrix,
}

impl PreparedRegion {
    pub(crate) fn new(
        src: SharedSource,
        beg: Tz,
        end: Tz,
        off: Tz,
        vol_beg: f32,
        vol_end: f32,
        pan: f32,
    ) -> Self {
        let gains = gain_matrix(src.num_channels(), pan);
        PreparedRegion {
            src: Some(src),
            beg,
            end,
            off,
            vol_beg,
            vol_end,
            pan,
            gains,
        }
    }

    /// Placeholder piece with no source yet; a mutator patches `src`,
    /// `beg`, `end` and `off` at splice time.
    pub(crate) fn placeholder(vol_beg: f32, vol_end: f32) -> Self {
        PreparedRegion {
            src: None,
            beg: 0,
            end: 0,
            off: 0,
            vol_beg,
            vol_end,
            pan: 0.0,
            gains: [[0.0; 2]; 2],
        }
    }

    /// Attach a source and refresh the cached pan matrix.
    pub(crate) fn set_src(&mut self, src: SharedSource) {
        self.gains = gain_matrix(src.num_channels(), self.pan);
        self.src = Some(src);
    }
}

impl std::fmt::Debug for PreparedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{beg={} end={} off={} vol={:.2}:{:.2} pan={:+.2}}}",
            self.beg, self.end, self.off, self.vol_beg, self.vol_end, self.pan
        )
    }
}

/// Mutable mixer state, behind the session's mutex.
struct Inner {
    /// Current read cursor, in session frames.
    pos: Tz,
    /// End of the last region added; never decreases.
    length: Tz,
    /// All prepared regions, sorted ascending by `beg`.
    regions: Vec<PreparedRegion>,
    /// Index of the first region not yet pulled into `active`.
    r_pos: usize,
    /// Regions overlapping the current window.
    active: Vec<PreparedRegion>,
    /// Per-channel scratch output, reused between windows.
    scratch: [Buffer; NUM_CHANNELS],
    /// Valid window length in `scratch`; 0 invalidates the fast path.
    scratch_len: usize,
}

/// Timeline of prepared regions that is itself a [`Source`].
pub struct Session {
    sample_rate: Tz,
    forget_past: bool,
    inner: Mutex<Inner>,
}

impl Session {
    /// Create an empty session.
    ///
    /// A forgetful session discards regions once its cursor has passed them
    /// and refuses to rewind; use it for live playback where memory must
    /// stay bounded. A non-forgetful session supports random access and
    /// rewind, which offline rendering wants.
    pub fn new(sample_rate: Tz, forget_past: bool) -> Self {
        Session {
            sample_rate,
            forget_past,
            inner: Mutex::new(Inner {
                pos: 0,
                length: 0,
                regions: Vec::new(),
                r_pos: 0,
                active: Vec::new(),
                scratch: [Vec::new(), Vec::new()],
                scratch_len: 0,
            }),
        }
    }

    /// Build a forgetful session directly from prepared pieces.
    ///
    /// Mutator constructors use this to pre-shape their splice timelines;
    /// `regions` must already be sorted by `beg`.
    pub(crate) fn from_prepared(sample_rate: Tz, length: Tz, regions: Vec<PreparedRegion>) -> Self {
        Session {
            sample_rate,
            forget_past: true,
            inner: Mutex::new(Inner {
                pos: 0,
                length,
                regions,
                r_pos: 0,
                active: Vec::new(),
                scratch: [Vec::new(), Vec::new()],
                scratch_len: 0,
            }),
        }
    }

    /// Whether this session discards its past.
    pub fn forget_past(&self) -> bool {
        self.forget_past
    }

    /// Current read cursor.
    pub fn position(&self) -> Tz {
        self.inner.lock().unwrap().pos
    }

    /// Validate `region` and place it on the timeline.
    ///
    /// The region decomposes into up to three prepared pieces (fade-in,
    /// body, fade-out), each inserted in sorted order. Rejects sources whose
    /// sample rate differs from the session's and channel counts outside
    /// mono/stereo.
    pub fn add_region(&self, region: Region) -> Result<()> {
        let src = region.source;
        if src.sample_rate() != self.sample_rate {
            return Err(Error::SampleRateMismatch {
                source_rate: src.sample_rate(),
                session_rate: self.sample_rate,
            });
        }
        let channels = src.num_channels();
        if channels < 1 || channels > NUM_CHANNELS {
            return Err(Error::UnsupportedChannels(channels));
        }

        let src_len = src.length();
        if region.offset < 0 || region.offset > src_len {
            return Err(Error::InvalidOffset {
                offset: region.offset,
                source_len: src_len,
            });
        }
        if region.length < 0 || region.length > src_len - region.offset {
            return Err(Error::InvalidLength {
                length: region.length,
                available: src_len - region.offset,
            });
        }
        let length = if region.length == 0 {
            src_len - region.offset
        } else {
            region.length
        };

        if region.fade_in < 0
            || region.fade_out < 0
            || region.fade_in + region.fade_out > length
        {
            return Err(Error::InvalidFade {
                fade_in: region.fade_in,
                fade_out: region.fade_out,
                length,
            });
        }

        let end = region.begin + length;
        let mut inner = self.inner.lock().unwrap();

        if region.fade_in > 0 {
            inner.insert_region(PreparedRegion::new(
                src.clone(),
                region.begin,
                region.begin + region.fade_in,
                region.offset,
                0.0,
                region.volume,
                region.pan,
            ));
        }
        if region.begin + region.fade_in != end - region.fade_out {
            inner.insert_region(PreparedRegion::new(
                src.clone(),
                region.begin + region.fade_in,
                end - region.fade_out,
                region.offset + region.fade_in,
                region.volume,
                region.volume,
                region.pan,
            ));
        }
        if region.fade_out > 0 {
            inner.insert_region(PreparedRegion::new(
                src,
                end - region.fade_out,
                end,
                region.offset + length - region.fade_out,
                region.volume,
                0.0,
                region.pan,
            ));
        }

        if inner.length < end {
            inner.length = end;
        }
        trace!(
            begin = region.begin,
            end,
            regions = inner.regions.len(),
            "region added"
        );
        Ok(())
    }

    /// Move the read cursor to `pos` and rebuild the active set.
    ///
    /// # Panics
    /// Rewinding a forgetful session is a programmer error and panics: the
    /// regions behind the cursor are gone.
    pub fn set_position(&self, pos: Tz) {
        let mut inner = self.inner.lock().unwrap();
        self.set_position_locked(&mut inner, pos);
    }

    fn set_position_locked(&self, inner: &mut Inner, pos: Tz) {
        if inner.pos == pos {
            return;
        }
        if pos < inner.pos && self.forget_past {
            panic!(
                "rewind of forgetful session: {} < {}",
                pos, inner.pos
            );
        }
        inner.pos = pos;
        inner.scratch_len = 0;

        // Linear rebuild; an interval tree would do it in log(n).
        inner.active.clear();
        inner.r_pos = 0;
        while inner.r_pos < inner.regions.len() {
            let r = &inner.regions[inner.r_pos];
            if pos <= r.beg {
                break;
            }
            if pos < r.end {
                let r = r.clone();
                inner.active.push(r);
            }
            inner.r_pos += 1;
        }
    }

    /// Pre-size the scratch buffers for windows of `length` frames.
    ///
    /// The realtime path calls this once, at splice-construction time, so
    /// the first window mixed after a swap does not allocate.
    pub fn allocate_buffer(&self, length: Tz) {
        let mut inner = self.inner.lock().unwrap();
        inner.allocate(length as usize);
        inner.scratch_len = 0;
    }

    /// Shallow copy: fresh region and active vectors, shared sources, fresh
    /// scratch. The effect splice mixes an overlay into a snapshot of the
    /// running timeline without disturbing the original.
    pub fn clone_shallow(&self) -> Session {
        let inner = self.inner.lock().unwrap();
        Session {
            sample_rate: self.sample_rate,
            forget_past: self.forget_past,
            inner: Mutex::new(Inner {
                pos: inner.pos,
                length: inner.length,
                regions: inner.regions.clone(),
                r_pos: inner.r_pos,
                active: inner.active.clone(),
                scratch: [Vec::new(), Vec::new()],
                scratch_len: 0,
            }),
        }
    }

    /// Patch a pre-shaped piece in place. Mutator-only; the session must not
    /// be visible to the realtime consumer yet.
    pub(crate) fn patch_region(&self, idx: usize, patch: impl FnOnce(&mut PreparedRegion)) {
        let mut inner = self.inner.lock().unwrap();
        patch(&mut inner.regions[idx]);
    }

    /// Reset the cursor for a splice without the rewind check or an active
    /// rebuild; the pre-shaped regions all lie at or after `pos`.
    pub(crate) fn reset_cursor(&self, pos: Tz) {
        let mut inner = self.inner.lock().unwrap();
        inner.pos = pos;
        inner.r_pos = 0;
        inner.active.clear();
        inner.scratch_len = 0;
    }

    /// Raise the timeline end, never lowering it.
    pub(crate) fn raise_length(&self, length: Tz) {
        let mut inner = self.inner.lock().unwrap();
        if inner.length < length {
            inner.length = length;
        }
    }

    #[cfg(test)]
    pub(crate) fn debug_counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.lock().unwrap();
        (inner.regions.len(), inner.r_pos, inner.active.len())
    }

    #[cfg(test)]
    pub(crate) fn debug_sorted(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.regions.windows(2).all(|w| w[0].beg <= w[1].beg)
    }
}

impl Source for Session {
    fn sample_rate(&self) -> Tz {
        self.sample_rate
    }

    fn num_channels(&self) -> usize {
        NUM_CHANNELS
    }

    fn length(&self) -> Tz {
        self.inner.lock().unwrap().length
    }

    fn samples(&self, channel: usize, offset: Tz, length: Tz, sink: &mut dyn FnMut(&[f32])) {
        let mut inner = self.inner.lock().unwrap();
        let window = length as usize;

        // Fast path: the previous window ended exactly here, so the scratch
        // already holds the mix. The stream consumer always lands here for
        // its second channel of each chunk.
        if !(offset + length == inner.pos && inner.scratch_len == window) {
            self.set_position_locked(&mut inner, offset);
            inner.allocate(window);
            inner.mix_window(self.forget_past);
        }
        sink(&inner.scratch[channel][..window]);
    }

    fn as_session(&self) -> Option<&Session> {
        Some(self)
    }
}

impl Inner {
    /// Size and zero the scratch window.
    fn allocate(&mut self, length: usize) {
        for ch in self.scratch.iter_mut() {
            if ch.len() < length {
                ch.resize(length, 0.0);
            }
            buffer::zero(&mut ch[..length]);
        }
        self.scratch_len = length;
    }

    /// Splice `r` into the sorted region list, keeping the cursor
    /// bookkeeping consistent.
    ///
    /// If the insertion lands before the consumption cursor (including the
    /// boundary case where it lands *at* the cursor index but begins before
    /// the playback position), `r_pos` advances so the new region is never
    /// re-activated from behind. A region straddling the playback position
    /// joins the active set immediately.
    fn insert_region(&mut self, r: PreparedRegion) {
        let idx = self.regions.partition_point(|x| x.beg <= r.beg);
        if idx < self.r_pos || (idx == self.r_pos && r.beg < self.pos) {
            self.r_pos += 1;
        }
        if self.pos > r.beg && self.pos < r.end {
            self.active.push(r.clone());
        }
        self.regions.insert(idx, r);
    }

    /// Mix one window of `scratch_len` frames at the cursor, then advance.
    ///
    /// The scratch must be freshly zeroed (`allocate`). Regions whose start
    /// falls inside the window join the active set first; every active
    /// region then adds its overlap into the scratch, and regions ending
    /// within the window drop out.
    fn mix_window(&mut self, forget_past: bool) {
        let length = self.scratch_len as Tz;
        if length == 0 {
            return;
        }
        let end = self.pos + length;

        // Activate regions starting inside this window.
        while self.r_pos < self.regions.len() {
            let r = &self.regions[self.r_pos];
            if r.beg >= end {
                break;
            }
            let r = r.clone();
            self.active.push(r);
            self.r_pos += 1;
        }
        // A forgetful session reclaims everything the cursor has consumed.
        // The active set holds its own handles, so the drain is safe.
        if forget_past && self.r_pos > 0 {
            self.regions.drain(..self.r_pos);
            self.r_pos = 0;
        }

        let pos = self.pos;
        let mut last_active = 0;
        for idx in 0..self.active.len() {
            let r = self.active[idx].clone();

            // Overlap of region and window, in region and buffer frames.
            let (r_off, b_off) = if r.beg < pos {
                (pos - r.beg, 0)
            } else {
                (0, r.beg - pos)
            };
            let r_end = r.end.min(end);
            let b_beg = b_off as usize;
            let b_end = (r_end - pos) as usize;
            let r_len = r_end - r.beg - r_off;

            // Compact survivors before touching the source, so a region that
            // outlives the window is never lost.
            if end < r.end {
                self.active[last_active] = r.clone();
                last_active += 1;
            }

            // Degenerate pieces (a spliced body whose clip is shorter than
            // its fades) contribute nothing.
            if r_len <= 0 {
                continue;
            }

            let Some(src) = r.src.clone() else {
                continue;
            };

            // Squared ramp endpoints for this window's slice of the fade;
            // the sqrt ramp in the mix undoes the square, giving an
            // equal-power curve in a single pass.
            let (mut init, mut targ) = (r.vol_beg, r.vol_end);
            if init != targ {
                let init_sqr = init * init;
                let coef = (targ * targ - init_sqr) / (r.end - r.beg) as f32;
                init = init_sqr + coef * r_off as f32;
                targ = init_sqr + coef * (r_off + r_len) as f32;
            }

            let channels = src.num_channels();
            for i in 0..channels {
                let gains = r.gains[i];
                let [ch0, ch1] = &mut self.scratch;
                let mut dst: [&mut [f32]; NUM_CHANNELS] =
                    [&mut ch0[b_beg..b_end], &mut ch1[b_beg..b_end]];

                src.samples(i, r.off + r_off, r_len, &mut |s| {
                    debug_assert_eq!(s.len() as Tz, r_len);
                    for (j, dst) in dst.iter_mut().enumerate() {
                        if init == targ {
                            let g = init * gains[j];
                            if g == 1.0 {
                                buffer::mix(dst, s);
                            } else if g.abs() >= 1e-8 {
                                buffer::mix_gain(dst, s, g);
                            }
                        } else {
                            let g = gains[j] * gains[j];
                            buffer::mix_sqrt_ramp(dst, s, g * init, g * targ);
                        }
                    }
                });
            }
        }
        self.active.truncate(last_active);
        self.pos += length;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Session")
            .field("sample_rate", &self.sample_rate)
            .field("forget_past", &self.forget_past)
            .field("pos", &inner.pos)
            .field("length", &inner.length)
            .field("regions", &inner.regions.len())
            .field("active", &inner.active.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemSource;
    use std::sync::Arc;

    const RATE: Tz = 44100;
    const LENGTH: Tz = 100;

    fn test_source(channels: usize) -> SharedSource {
        let data = (0..channels).map(|_| vec![1.0f32; LENGTH as usize]).collect();
        Arc::new(MemSource::new(data, RATE))
    }

    fn read(s: &Session, channel: usize, offset: Tz, length: Tz) -> Vec<f32> {
        let mut out = Vec::new();
        s.samples(channel, offset, length, &mut |buf| out.extend_from_slice(buf));
        out
    }

    #[test]
    fn test_empty_session() {
        let s = Session::new(RATE, true);
        assert_eq!(s.position(), 0);
        assert_eq!(s.sample_rate(), RATE);
        assert_eq!(s.num_channels(), 2);
        assert_eq!(s.length(), 0);

        let buf = read(&s, 0, 0, LENGTH);
        assert!(buf.iter().all(|&v| v == 0.0), "non-zero samples from empty session");
        assert_eq!(s.position(), LENGTH);
    }

    #[test]
    fn test_add_region_keeps_sorted_order_and_cursor() {
        let s = Session::new(RATE, true);
        let src = test_source(1);

        s.add_region(Region::new(src.clone(), LENGTH)).unwrap();
        assert_eq!(s.debug_counts(), (1, 0, 0));

        s.add_region(Region::new(src.clone(), -LENGTH)).unwrap();
        assert_eq!(s.debug_counts(), (2, 1, 0));

        s.add_region(Region::new(src.clone(), 0)).unwrap();
        assert_eq!(s.debug_counts(), (3, 1, 0));

        // Straddles the cursor at 0: counted as consumed and active.
        s.add_region(Region::new(src, -LENGTH / 2)).unwrap();
        let (regions, r_pos, active) = s.debug_counts();
        assert_eq!(regions, 4);
        assert_eq!(r_pos, 2);
        assert_eq!(active, 1);

        assert!(s.debug_sorted(), "regions must stay sorted by begin");
    }

    #[test]
    fn test_add_region_validation() {
        let s = Session::new(RATE, true);
        let src = test_source(1);

        let wrong_rate = Arc::new(MemSource::new(vec![vec![0.0; 10]], 48000));
        assert!(matches!(
            s.add_region(Region::new(wrong_rate, 0)),
            Err(Error::SampleRateMismatch { .. })
        ));

        let too_many = Arc::new(MemSource::new(vec![vec![0.0; 4]; 3], RATE));
        assert!(matches!(
            s.add_region(Region::new(too_many, 0)),
            Err(Error::UnsupportedChannels(3))
        ));

        let mut r = Region::new(src.clone(), 0);
        r.offset = LENGTH + 1;
        assert!(matches!(s.add_region(r), Err(Error::InvalidOffset { .. })));

        let mut r = Region::new(src.clone(), 0);
        r.length = LENGTH + 1;
        assert!(matches!(s.add_region(r), Err(Error::InvalidLength { .. })));

        let mut r = Region::new(src, 0);
        r.fade_in = LENGTH;
        r.fade_out = 1;
        assert!(matches!(s.add_region(r), Err(Error::InvalidFade { .. })));
    }

    #[test]
    fn test_set_position_rebuilds_active() {
        let s = Session::new(RATE, false);
        s.add_region(Region::new(test_source(1), 0)).unwrap();

        s.set_position(LENGTH);
        assert_eq!(s.debug_counts(), (1, 1, 0));

        s.set_position(0);
        assert_eq!(s.debug_counts(), (1, 0, 0));

        s.set_position(LENGTH / 2);
        assert_eq!(s.debug_counts(), (1, 1, 1));
    }

    #[test]
    #[should_panic(expected = "rewind of forgetful session")]
    fn test_forgetful_rewind_panics() {
        let s = Session::new(RATE, true);
        s.add_region(Region::new(test_source(1), 0)).unwrap();
        let _ = read(&s, 0, 0, LENGTH);
        s.set_position(0);
    }

    #[test]
    fn test_gap_between_regions_is_silent() {
        let s = Session::new(RATE, true);
        s.add_region(Region::new(test_source(1), 0)).unwrap();
        s.set_position(LENGTH);
        s.add_region(Region::new(test_source(1), 2 * LENGTH)).unwrap();

        let buf = read(&s, 0, LENGTH, LENGTH);
        assert!(buf.iter().all(|&v| v == 0.0), "gap must be silent");
    }

    #[test]
    fn test_mix_mono_region() {
        let s = Session::new(RATE, false);
        s.add_region(Region::new(test_source(1), 0)).unwrap();

        // Fully inside the region: constant non-zero output on both channels.
        for c in 0..2 {
            let buf = read(&s, c, 0, LENGTH);
            let v = buf[0];
            assert!(v != 0.0);
            assert!(buf.iter().all(|&x| x == v));
        }

        // Window starting before the region: leading silence, then signal.
        s.set_position(-LENGTH / 2);
        for c in 0..2 {
            let buf = read(&s, c, -LENGTH / 2, LENGTH);
            let half = (LENGTH / 2) as usize;
            assert!(buf[..half].iter().all(|&x| x == 0.0));
            let v = buf[half];
            assert!(v != 0.0);
            assert!(buf[half..].iter().all(|&x| x == v));
        }

        // Window extending past the region: signal, then trailing silence.
        s.set_position(LENGTH / 2);
        for c in 0..2 {
            let buf = read(&s, c, LENGTH / 2, LENGTH);
            let half = (LENGTH / 2) as usize;
            let v = buf[0];
            assert!(v != 0.0);
            assert!(buf[..half].iter().all(|&x| x == v));
            assert!(buf[half..].iter().all(|&x| x == 0.0));
        }
        assert_eq!(s.debug_counts().2, 0, "region must leave the active set");
    }

    #[test]
    fn test_mix_stereo_region() {
        let s = Session::new(RATE, false);
        s.add_region(Region::new(test_source(2), 0)).unwrap();

        for c in 0..2 {
            let buf = read(&s, c, 0, LENGTH);
            let v = buf[0];
            assert!(v != 0.0);
            assert!(buf.iter().all(|&x| x == v));
        }
    }

    #[test]
    fn test_fade_decomposition_and_monotonicity() {
        let s = Session::new(RATE, true);
        let mut r = Region::new(test_source(2), 0);
        r.fade_in = LENGTH / 2;
        r.fade_out = LENGTH / 2;
        s.add_region(r).unwrap();

        // fade-in + fade-out meet in the middle: exactly two pieces.
        assert_eq!(s.debug_counts().0, 2);

        // Channel 1 comes from the fast path of the same window.
        for c in 0..2 {
            let buf = read(&s, c, 0, LENGTH);
            let half = (LENGTH / 2) as usize;
            // Rising half
            let mut prev = 0.0;
            for (j, &v) in buf[..half].iter().enumerate() {
                assert!(v >= prev, "fade-in not monotone at {}", j);
                prev = v;
            }
            // Falling half
            let mut prev = f32::INFINITY;
            for (j, &v) in buf[half..].iter().enumerate() {
                assert!(v <= prev, "fade-out not monotone at {}", j);
                prev = v;
            }
        }
    }

    #[test]
    fn test_pan_extremes() {
        const THRES: f32 = 1e-7;
        for channels in [1, 2] {
            // Hard left: right channel silent.
            let s = Session::new(RATE, true);
            let mut r = Region::new(test_source(channels), 0);
            r.pan = -1.0;
            s.add_region(r).unwrap();
            let buf = read(&s, 1, 0, LENGTH);
            assert!(buf.iter().all(|&v| v <= THRES), "{}ch hard left leaks right", channels);

            // Hard right: left channel silent.
            let s = Session::new(RATE, true);
            let mut r = Region::new(test_source(channels), 0);
            r.pan = 1.0;
            s.add_region(r).unwrap();
            let buf = read(&s, 0, 0, LENGTH);
            assert!(buf.iter().all(|&v| v <= THRES), "{}ch hard right leaks left", channels);
        }
    }

    #[test]
    fn test_samples_fast_path_is_idempotent() {
        let s = Session::new(RATE, true);
        s.add_region(Region::new(test_source(1), 0)).unwrap();

        let first = read(&s, 0, 0, LENGTH);
        let second = read(&s, 0, 0, LENGTH);
        assert_eq!(first, second);

        // The other channel of the same window also comes from the scratch.
        let right = read(&s, 1, 0, LENGTH);
        assert_eq!(right, first);
    }

    #[test]
    fn test_insert_behind_cursor_is_skipped() {
        let s = Session::new(RATE, false);
        s.add_region(Region::new(test_source(1), 0)).unwrap();
        s.set_position(50);

        // Region entirely consumed already: [25, 75) with cursor at 50 is
        // partially behind, but one ending at 50 is fully behind.
        let mut r = Region::new(test_source(1), 25);
        r.length = 25;
        s.add_region(r).unwrap();

        let (_, r_pos, active) = s.debug_counts();
        assert_eq!(active, 1, "only the original region is active");
        assert_eq!(r_pos, 2, "cursor bookkeeping must skip the stale region");

        // And the next window mixes only the original region.
        let buf = read(&s, 0, 50, 50);
        let v = buf[0];
        assert!(buf.iter().all(|&x| x == v));
    }

    #[test]
    fn test_clone_shallow_is_independent() {
        let s = Session::new(RATE, true);
        s.add_region(Region::new(test_source(1), 0)).unwrap();

        let clone = s.clone_shallow();
        clone.add_region(Region::new(test_source(1), 0)).unwrap();

        assert_eq!(s.debug_counts().0, 1);
        assert_eq!(clone.debug_counts().0, 2);

        // Doubled signal on the clone, original untouched.
        let orig = read(&s, 0, 0, LENGTH);
        let doubled = read(&clone, 0, 0, LENGTH);
        assert!((doubled[0] - 2.0 * orig[0]).abs() < 1e-6);
    }

    #[test]
    fn test_length_is_monotone() {
        let s = Session::new(RATE, true);
        s.add_region(Region::new(test_source(1), 200)).unwrap();
        assert_eq!(s.length(), 200 + LENGTH);
        s.add_region(Region::new(test_source(1), 0)).unwrap();
        assert_eq!(s.length(), 200 + LENGTH, "shorter add must not lower length");
    }

    #[test]
    fn test_forgetful_session_drops_consumed_regions() {
        let s = Session::new(RATE, true);
        for i in 0..4 {
            s.add_region(Region::new(test_source(1), i * LENGTH)).unwrap();
        }
        assert_eq!(s.debug_counts().0, 4);

        let _ = read(&s, 0, 0, 2 * LENGTH + 1);
        let (regions, r_pos, _) = s.debug_counts();
        assert!(regions <= 2, "consumed prefix must be reclaimed, have {}", regions);
        assert_eq!(r_pos, 0);
    }

    #[test]
    fn test_nested_session_as_source() {
        let outer = Session::new(RATE, false);
        let inner = Session::new(RATE, false);
        inner.add_region(Region::new(test_source(1), 0)).unwrap();

        outer
            .add_region(Region::new(Arc::new(inner) as SharedSource, 0))
            .unwrap();

        let buf = read(&outer, 0, 0, LENGTH);
        assert!(buf[0] != 0.0, "nested session must contribute samples");
    }
}
