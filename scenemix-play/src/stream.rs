//! Realtime stream with lock-free source handoff
//!
//! A [`Stream`] owns two source slots and a single packed atomic word:
//!
//! ```text
//!   63                      2    1         0
//!   +-----------------------+----+---------+
//!   | position (frames)     |slot| running |
//!   +-----------------------+----+---------+
//! ```
//!
//! Only the audio callback advances the position (one `fetch_add` per
//! chunk); only the control thread flips the slot bit (compare-and-swap,
//! retried on contention). The slot the state word points at is read-only to
//! the control thread; the other slot is its private scratch, which is what
//! makes publishing a replacement source race-free: write the inactive slot,
//! then CAS the flip. Acquire/release ordering on the word makes the slot
//! write visible before the flipped bit is.
//!
//! The render path never blocks, locks or allocates. When the active source
//! cannot supply the next full chunk it signals end-of-stream on a
//! single-slot channel and emits silence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use scenemix_engine::{SharedSource, Source, SourceMutator, Tz};

const RUN_BIT: u64 = 1;
const SLOT_BIT: u64 = 1 << 1;
const POS_SHIFT: u32 = 2;

/// A source slot.
///
/// The trait object sits behind its own `Arc` so the swap cell stores a
/// sized pointee; the extra indirection is touched once per chunk.
type Slot = ArcSwapOption<SharedSource>;

struct Shared {
    state: AtomicU64,
    slots: [Slot; 2],
    end_tx: Sender<()>,
}

impl Shared {
    #[inline]
    fn slot_index(state: u64) -> usize {
        ((state & SLOT_BIT) >> 1) as usize
    }

    /// Fill one interleaved output chunk. Audio-thread only.
    fn render(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 || out.len() < channels {
            return;
        }
        let frames = (out.len() / channels) as Tz;

        // Paused streams hold their position.
        if self.state.load(Ordering::Acquire) & RUN_BIT == 0 {
            return;
        }

        let delta = (frames as u64) << POS_SHIFT;
        let state = self.state.fetch_add(delta, Ordering::AcqRel) + delta;
        let pos_after = (state >> POS_SHIFT) as Tz;
        let pos = pos_after - frames;

        let Some(src) = self.slots[Self::slot_index(state)].load_full() else {
            self.signal_end();
            return;
        };
        let src: &SharedSource = &src;

        // The source must cover the whole chunk; a partial window would
        // violate its sampling contract.
        if pos_after > src.length() {
            self.signal_end();
            return;
        }

        let out_channels = channels.min(2);
        for c in 0..out_channels {
            // Mono sources feed both outputs.
            let src_channel = c.min(src.num_channels() - 1);
            src.samples(src_channel, pos, frames, &mut |buf| {
                for (i, &v) in buf.iter().enumerate() {
                    // Soft limiter: keeps hot mixes inside (-1, 1) without
                    // the hard edges of clamping.
                    out[i * channels + c] = v / (1.0 + v.abs());
                }
            });
        }
    }

    fn signal_end(&self) {
        // Single-slot, non-blocking: dropped when nobody is waiting.
        let _ = self.end_tx.try_send(());
    }
}

/// Control-thread handle for a realtime output stream.
///
/// [`play`](Stream::play) and [`switch`](Stream::switch) must come from a
/// single control thread; the inactive-slot discipline assumes one writer.
/// The render side is driven independently by the audio callback through
/// [`StreamRenderer`].
pub struct Stream {
    shared: Arc<Shared>,
    end_rx: Receiver<()>,
    sample_rate: Tz,
    chunk_size: Tz,
}

impl Stream {
    /// Create a stopped stream with empty slots.
    ///
    /// `chunk_size` is the fixed number of frames the driver requests per
    /// callback; mutators size their scratch to it so the first chunk after
    /// a swap never allocates.
    pub fn new(sample_rate: Tz, chunk_size: Tz) -> Self {
        let (end_tx, end_rx) = bounded(1);
        Stream {
            shared: Arc::new(Shared {
                state: AtomicU64::new(0),
                slots: [ArcSwapOption::empty(), ArcSwapOption::empty()],
                end_tx,
            }),
            end_rx,
            sample_rate,
            chunk_size,
        }
    }

    pub fn sample_rate(&self) -> Tz {
        self.sample_rate
    }

    pub fn chunk_size(&self) -> Tz {
        self.chunk_size
    }

    /// Current playback position in frames.
    pub fn position(&self) -> Tz {
        (self.shared.state.load(Ordering::Acquire) >> POS_SHIFT) as Tz
    }

    /// Let the callback advance.
    pub fn start(&self) {
        self.shared.state.fetch_or(RUN_BIT, Ordering::AcqRel);
    }

    /// Freeze the position; the callback emits silence meanwhile.
    pub fn stop(&self) {
        self.shared.state.fetch_and(!RUN_BIT, Ordering::AcqRel);
    }

    /// Replace the active source with `src`, keeping the position.
    ///
    /// The new source must be built for the current position: playback
    /// continues where the counter stands, not at zero.
    pub fn play(&self, src: SharedSource) {
        let shared = &self.shared;
        let mut orig = shared.state.load(Ordering::Acquire);
        // The slot bit only ever changes on this thread, so the inactive
        // slot stays ours across CAS retries.
        shared.slots[Shared::slot_index(orig) ^ 1].store(Some(Arc::new(src)));
        loop {
            match shared.state.compare_exchange(
                orig,
                orig ^ SLOT_BIT,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => orig = current,
            }
        }
        debug!(position = self.position(), "source replaced");
    }

    /// Transform the playing timeline through `mutator` and publish the
    /// result.
    ///
    /// The whole observe–mutate–publish sequence retries when the callback
    /// advances the position mid-flight, so the splice position always
    /// reflects the state the consumer will actually be in. The mutator may
    /// therefore run more than once; only the final result becomes visible.
    pub fn switch(&self, mutator: &mut dyn SourceMutator) {
        let shared = &self.shared;
        loop {
            let orig = shared.state.load(Ordering::Acquire);
            let active = Shared::slot_index(orig);
            let cur = shared.slots[active]
                .load_full()
                .map(|s| SharedSource::clone(&s));
            let pos = (orig >> POS_SHIFT) as Tz;

            let next = mutator.mutate(cur, pos);
            shared.slots[active ^ 1].store(Some(Arc::new(next)));

            if shared
                .state
                .compare_exchange(orig, orig ^ SLOT_BIT, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!(position = pos, "timeline switched");
                break;
            }
            debug!("switch raced the callback; retrying");
        }
    }

    /// End-of-stream notifications.
    ///
    /// Fired (coalesced) whenever the callback runs past the active
    /// source's end.
    pub fn end_signal(&self) -> Receiver<()> {
        self.end_rx.clone()
    }

    /// Handle for the audio callback.
    pub fn renderer(&self) -> StreamRenderer {
        StreamRenderer {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Audio-thread handle: renders interleaved chunks from the active slot.
#[derive(Clone)]
pub struct StreamRenderer {
    shared: Arc<Shared>,
}

impl StreamRenderer {
    /// Fill `out` (interleaved, `channels` wide) from the active source.
    ///
    /// Realtime-safe: one atomic add, one slot read, no locks beyond the
    /// uncontended session interior, no allocation.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        self.shared.render(out, channels);
    }
}
