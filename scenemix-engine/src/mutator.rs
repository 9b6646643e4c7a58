//! Timeline mutators
//!
//! A mutator turns the currently playing source into its replacement,
//! splicing new material at a runtime-chosen position. The stream hands it
//! the exact next-unplayed frame; because the publish step may race with the
//! realtime consumer and retry, `mutate` can run several times before its
//! result becomes visible, and must therefore be repeatable.
//!
//! [`Ambience`] and [`Music`] are pre-shaped mini-timelines: a forgetful
//! [`Session`] whose prepared pieces are built once, with their `(beg, end,
//! off)` fields patched in at mutate time. Their scratch buffers are sized
//! to the stream chunk up front, so the first window mixed after a swap
//! does not allocate. [`Effect`] instead overlays a clip *onto* the running
//! timeline by cloning it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::session::{PreparedRegion, Region, Session};
use crate::source::{SharedSource, Source};
use crate::time::Tz;

/// Transforms the currently playing timeline into its replacement.
///
/// Pure at call time: the returned source is the complete new timeline, and
/// calling `mutate` again with a later position simply re-shapes it. A
/// mutator is built per control action and discarded once its result has
/// been published.
pub trait SourceMutator: Send {
    /// Build the replacement for `cur`, splicing at `pos` (in frames).
    fn mutate(&mut self, cur: Option<SharedSource>, pos: Tz) -> SharedSource;
}

impl std::fmt::Debug for dyn SourceMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SourceMutator")
    }
}

/// Crossfade from whatever is playing into a new ambience bed.
///
/// Three pre-shaped pieces: the outgoing timeline fading to silence, the new
/// bed fading in over the same window, and the bed's body thereafter. The
/// bed is addressed absolutely (its source offset equals the timeline
/// position), so switching back and forth re-enters the bed mid-flow
/// instead of restarting it.
pub struct Ambience {
    session: Arc<Session>,
    bed_len: Tz,
    fade: Tz,
}

impl Ambience {
    pub fn new(next: SharedSource, fade: Tz, chunk_size: Tz) -> Self {
        let bed_len = next.length();
        let regions = vec![
            // Outgoing timeline, patched in at mutate time.
            PreparedRegion::placeholder(1.0, 0.0),
            PreparedRegion::new(next.clone(), 0, 0, 0, 0.0, 1.0, 0.0),
            PreparedRegion::new(next.clone(), 0, bed_len, 0, 1.0, 1.0, 0.0),
        ];
        let session = Session::from_prepared(next.sample_rate(), bed_len, regions);
        session.allocate_buffer(chunk_size);
        Ambience {
            session: Arc::new(session),
            bed_len,
            fade,
        }
    }
}

impl SourceMutator for Ambience {
    fn mutate(&mut self, cur: Option<SharedSource>, pos: Tz) -> SharedSource {
        debug!(pos, fade = self.fade, "splicing ambience");
        let fade = self.fade;

        // The fade-out must not read past the outgoing source.
        let fade_end = (pos + fade).min(cur.as_ref().map_or(pos, |c| c.length())).max(pos);
        self.session.patch_region(0, |r| {
            match cur {
                Some(cur) => r.set_src(cur),
                None => r.src = None,
            }
            r.beg = pos;
            r.end = fade_end;
            r.off = pos;
        });
        // The bed is addressed absolutely; nothing may read past its end.
        let bed_fade_end = (pos + fade).min(self.bed_len).max(pos);
        self.session.patch_region(1, |r| {
            r.beg = pos;
            r.end = bed_fade_end;
            r.off = pos;
        });
        self.session.patch_region(2, |r| {
            r.beg = pos + fade;
            r.off = pos + fade;
        });

        self.session.reset_cursor(pos);
        self.session.clone() as SharedSource
    }
}

/// Play a music clip over the current timeline, then hand off to an
/// ambience bed.
///
/// Six pre-shaped pieces: the outgoing timeline fading out, the clip fading
/// in, its body, its fade-out, the follow-up bed fading in under the clip's
/// tail, and the bed's body. The clip is addressed from its start; the bed
/// is addressed absolutely like an [`Ambience`] splice.
pub struct Music {
    session: Arc<Session>,
    music_len: Tz,
    bed_len: Tz,
    fade: Tz,
}

impl Music {
    pub fn new(music: SharedSource, next: SharedSource, fade: Tz, chunk_size: Tz) -> Self {
        let music_len = music.length();
        let bed_len = next.length();
        if music_len < 2 * fade {
            warn!(
                music_len,
                fade, "music clip shorter than its crossfades; body collapses"
            );
        }
        let regions = vec![
            PreparedRegion::placeholder(1.0, 0.0),
            PreparedRegion::new(music.clone(), 0, 0, 0, 0.0, 1.0, 0.0),
            PreparedRegion::new(music.clone(), 0, 0, 0, 1.0, 1.0, 0.0),
            PreparedRegion::new(music.clone(), 0, 0, 0, 1.0, 0.0, 0.0),
            PreparedRegion::new(next.clone(), 0, 0, 0, 0.0, 1.0, 0.0),
            PreparedRegion::new(next.clone(), 0, bed_len, 0, 1.0, 1.0, 0.0),
        ];
        let session = Session::from_prepared(next.sample_rate(), bed_len, regions);
        session.allocate_buffer(chunk_size);
        Music {
            session: Arc::new(session),
            music_len,
            bed_len,
            fade,
        }
    }
}

impl SourceMutator for Music {
    fn mutate(&mut self, cur: Option<SharedSource>, pos: Tz) -> SharedSource {
        debug!(pos, fade = self.fade, music_len = self.music_len, "splicing music");
        let fade = self.fade;
        let music_len = self.music_len;

        // The fade-out must not read past the outgoing source.
        let fade_end = (pos + fade).min(cur.as_ref().map_or(pos, |c| c.length())).max(pos);
        self.session.patch_region(0, |r| {
            match cur {
                Some(cur) => r.set_src(cur),
                None => r.src = None,
            }
            r.beg = pos;
            r.end = fade_end;
            r.off = pos;
        });
        self.session.patch_region(1, |r| {
            r.beg = pos;
            r.end = pos + fade;
            r.off = 0;
        });
        self.session.patch_region(2, |r| {
            r.beg = pos + fade;
            r.end = pos + music_len - fade;
            r.off = fade;
        });
        self.session.patch_region(3, |r| {
            r.beg = pos + music_len - fade;
            r.end = pos + music_len;
            r.off = music_len - fade;
        });
        // The bed is addressed absolutely; nothing may read past its end.
        // A bed already over collapses the fade-in instead of reordering
        // the region list.
        let bed_in_beg = pos + music_len - fade;
        let bed_in_end = (pos + music_len).min(self.bed_len).max(bed_in_beg);
        self.session.patch_region(4, |r| {
            r.beg = bed_in_beg;
            r.end = bed_in_end;
            r.off = bed_in_beg;
        });
        self.session.patch_region(5, |r| {
            r.beg = pos + music_len;
            r.off = pos + music_len;
        });

        // A clip longer than the follow-up bed must not end the stream early.
        self.session.raise_length(pos + music_len);
        self.session.reset_cursor(pos);
        self.session.clone() as SharedSource
    }
}

/// Overlay a one-shot clip onto the running timeline.
///
/// When the current source is a live (forgetful) session that still has
/// material ahead, the effect lands on a shallow clone of it, leaving the
/// original untouched for the consumer to finish its in-flight window.
/// Otherwise a fresh timeline carries just the effect.
///
/// The overlay starts `ahead` frames past the splice position: the cloned
/// session's cursor has already prefetched, and the margin keeps the
/// effect's onset out of consumed territory.
pub struct Effect {
    effect: SharedSource,
    fade: Tz,
    ahead: Tz,
    chunk_size: Tz,
}

impl Effect {
    pub fn new(effect: SharedSource, fade: Tz, ahead: Tz, chunk_size: Tz) -> Self {
        // Fades must fit the clip.
        let fade = fade.min(effect.length() / 2);
        Effect {
            effect,
            fade,
            ahead,
            chunk_size,
        }
    }

    fn overlay(&self, session: &Session, begin: Tz) -> bool {
        let region = Region {
            source: self.effect.clone(),
            begin,
            offset: 0,
            length: 0,
            volume: 1.0,
            pan: 0.0,
            fade_in: self.fade,
            fade_out: self.fade,
        };
        match session.add_region(region) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "effect does not fit current timeline");
                false
            }
        }
    }
}

impl SourceMutator for Effect {
    fn mutate(&mut self, cur: Option<SharedSource>, pos: Tz) -> SharedSource {
        let begin = pos + self.ahead;
        debug!(pos, begin, "overlaying effect");

        if let Some(live) = cur.as_ref().and_then(|c| c.as_session()) {
            if live.forget_past() && live.length() > begin {
                let clone = live.clone_shallow();
                if self.overlay(&clone, begin) {
                    clone.allocate_buffer(self.chunk_size);
                    return Arc::new(clone) as SharedSource;
                }
            }
        }

        // Nothing suitable to overlay onto: the effect plays alone.
        let session = Session::new(self.effect.sample_rate(), true);
        self.overlay(&session, begin);
        session.allocate_buffer(self.chunk_size);
        Arc::new(session) as SharedSource
    }
}
