//! End-to-end mixing scenarios
//!
//! Exercises the public engine surface the way the player does: build
//! timelines, pull windows, splice replacements mid-flight.

use std::sync::Arc;

use scenemix_engine::{
    Ambience, Effect, MemSource, Region, Session, SharedSource, Source, SourceMutator, Tz,
};

const RATE: Tz = 44100;

fn constant_source(value: f32, channels: usize, length: usize) -> SharedSource {
    let data = (0..channels).map(|_| vec![value; length]).collect();
    Arc::new(MemSource::new(data, RATE))
}

fn read(src: &dyn Source, channel: usize, offset: Tz, length: Tz) -> Vec<f32> {
    let mut out = Vec::new();
    src.samples(channel, offset, length, &mut |buf| {
        out.extend_from_slice(buf)
    });
    out
}

/// Two clips with a hole between them: the hole is pure silence.
#[test]
fn silent_tail_between_regions() {
    let session = Session::new(RATE, true);
    let src = constant_source(1.0, 1, 100);

    session.add_region(Region::new(src.clone(), 0)).unwrap();
    session.add_region(Region::new(src, 200)).unwrap();

    session.set_position(100);
    for channel in 0..2 {
        let buf = read(&session, channel, 100, 100);
        assert!(
            buf.iter().all(|&v| v == 0.0),
            "window [100, 200) must be silent on channel {}",
            channel
        );
    }
}

/// A clip that is all fade: rising to the midpoint, falling after it.
#[test]
fn crossfade_peak_at_midpoint() {
    let session = Session::new(RATE, true);
    let mut region = Region::new(constant_source(1.0, 2, 100), 0);
    region.length = 100;
    region.fade_in = 50;
    region.fade_out = 50;
    session.add_region(region).unwrap();

    let buf = read(&session, 0, 0, 100);
    assert!(buf[49] < buf[50], "still rising into the midpoint");
    assert!(buf[50] >= buf[51], "falling after the midpoint");
}

/// Mono clip panned hard left leaks nothing into the right channel.
#[test]
fn hard_left_pan_mono() {
    let session = Session::new(RATE, true);
    let mut region = Region::new(constant_source(1.0, 1, 100), 0);
    region.pan = -1.0;
    session.add_region(region).unwrap();

    let right = read(&session, 1, 0, 100);
    assert!(right.iter().all(|&v| v <= 1e-7), "right channel must stay silent");
}

/// Inserting a region already behind the cursor neither plays it nor
/// disturbs what is playing.
#[test]
fn insertion_behind_cursor_is_inert() {
    let session = Session::new(RATE, false);
    session
        .add_region(Region::new(constant_source(1.0, 2, 100), 0))
        .unwrap();

    // Consume up to frame 50 and capture what the rest should look like.
    let _ = read(&session, 0, 0, 50);
    let expected = read(&session, 0, 50, 50);
    session.set_position(50);

    // A clip that ended exactly at the cursor: fully consumed territory.
    let mut stale = Region::new(constant_source(1.0, 2, 100), 25);
    stale.length = 25;
    session.add_region(stale).unwrap();

    let buf = read(&session, 0, 50, 50);
    assert_eq!(buf, expected, "stale region must not alter the mix");
}

/// Ambience splice over a *session* source: the old timeline fades out from
/// the splice point while the bed fades in, and the bed owns the tail.
#[test]
fn ambience_splice_over_running_session() {
    let fade: Tz = 4410;
    let pos: Tz = 1000;

    let current = Session::new(RATE, true);
    current
        .add_region(Region::new(constant_source(0.5, 2, 100_000), 0))
        .unwrap();
    let current = Arc::new(current) as SharedSource;

    let next = constant_source(1.0, 2, 100_000);
    let mut mutator = Ambience::new(next, fade, 4096);
    let spliced = mutator.mutate(Some(current), pos);

    // Inside the fade window both parts are audible and their equal-power
    // sum tracks the expected curve.
    let buf = read(spliced.as_ref(), 0, pos, fade);
    for k in [1usize, fade as usize / 2, fade as usize - 1] {
        let t = k as f32 / fade as f32;
        let expected = 0.5 * (1.0 - t).sqrt() + t.sqrt();
        assert!(
            (buf[k] - expected).abs() < 1e-3,
            "frame {}: got {}, expected {}",
            k,
            buf[k],
            expected
        );
    }

    // Past the fade window only the bed remains.
    let buf = read(spliced.as_ref(), 0, pos + fade, 1024);
    assert!(buf.iter().all(|&v| (v - 1.0).abs() < 1e-5));
}

/// Effect overlay over a live timeline: the overlay is a snapshot, the
/// original keeps playing untouched.
#[test]
fn effect_over_ambience_leaves_original_alone() {
    let ahead: Tz = 2048;
    let live = Session::new(RATE, true);
    live.add_region(Region::new(constant_source(0.5, 2, 200_000), 0))
        .unwrap();
    let live = Arc::new(live);

    let _ = read(live.as_ref(), 0, 0, 4096);
    let pos = live.position();

    let effect = constant_source(0.25, 2, 8192);
    let mut mutator = Effect::new(effect, 441, ahead, 4096);
    let spliced = mutator.mutate(Some(live.clone() as SharedSource), pos);

    // Overlay body: bed plus effect.
    let overlaid = read(spliced.as_ref(), 0, pos + ahead + 441, 1024);
    assert!(
        overlaid.iter().all(|&v| (v - 0.75).abs() < 1e-3),
        "expected bed+effect, got {:?}",
        &overlaid[..4]
    );

    // The original session was not mutated by the overlay.
    let original = read(live.as_ref(), 0, pos, 1024);
    assert!(original.iter().all(|&v| (v - 0.5).abs() < 1e-5));
}

/// Superposition: two overlapping clips sum linearly.
#[test]
fn overlapping_regions_sum() {
    let session = Session::new(RATE, false);
    session
        .add_region(Region::new(constant_source(0.25, 2, 100), 0))
        .unwrap();
    session
        .add_region(Region::new(constant_source(0.5, 2, 100), 50))
        .unwrap();

    let buf = read(&session, 0, 0, 150);
    assert!(buf[..50].iter().all(|&v| (v - 0.25).abs() < 1e-6));
    assert!(buf[50..100].iter().all(|&v| (v - 0.75).abs() < 1e-6));
    assert!(buf[100..].iter().all(|&v| (v - 0.5).abs() < 1e-6));
}

/// Volume scales linearly and pan preserves power for mono sources.
#[test]
fn volume_and_center_pan() {
    let session = Session::new(RATE, true);
    let mut region = Region::new(constant_source(1.0, 1, 100), 0);
    region.volume = 0.5;
    session.add_region(region).unwrap();

    let left = read(&session, 0, 0, 100);
    let right = read(&session, 1, 0, 100);
    let expected = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
    assert!((left[0] - expected).abs() < 1e-6);
    assert!((right[0] - expected).abs() < 1e-6);
}
