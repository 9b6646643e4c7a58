//! Equal-power stereo panning
//!
//! Pan gains keep total acoustic power constant across the pan range by
//! moving along a sin/cos pair instead of a straight line. A centered mono
//! source lands at `1/sqrt(2)` on each output, and the extremes fully mute
//! the opposite channel.
//!
//! Gains are computed once per region at insert time and cached; the mixer
//! inner loop never calls into the trig functions.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Per-region crossfeed gains: `gains[src_channel][out_channel]`.
///
/// Mono sources only populate row 0.
pub type GainMatrix = [[f32; 2]; 2];

/// Equal-power gains for a mono source panned by `pan` in [-1, +1].
///
/// Returns `(left, right)`. Values outside the range are clamped. The angle
/// sweeps a quarter circle: hard left puts all power on the left output,
/// hard right on the right, center at `1/sqrt(2)` each.
pub fn mono_gain(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let (l, r) = ((1.0 - pan) * FRAC_PI_4).sin_cos();
    (l, r)
}

/// Equal-power crossfeed gains for a stereo source panned by `pan`.
///
/// Returns `(l2l, l2r, r2l, r2r)`. The pan is split into a per-channel pan
/// for the left and right inputs, each following the same equal-power rule:
/// at `pan == 0` the channels pass straight through, and a full pan folds
/// the far channel into the near output instead of discarding it.
pub fn stereo_gain(pan: f32) -> (f32, f32, f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let width = 1.0 - pan.abs();

    let pan_l = (pan + 1.0 - width) / 2.0;
    let pan_r = (pan + 1.0 + width) / 2.0;

    let (l2r, l2l) = (pan_l * FRAC_PI_2).sin_cos();
    let (r2r, r2l) = (pan_r * FRAC_PI_2).sin_cos();
    (l2l, l2r, r2l, r2r)
}

/// Build the crossfeed matrix for a source with `channels` channels.
///
/// # Panics
/// Panics on a channel count other than 1 or 2; region validation rejects
/// those before any matrix is built.
pub fn gain_matrix(channels: usize, pan: f32) -> GainMatrix {
    let mut gains = [[0.0; 2]; 2];
    match channels {
        1 => {
            let (l, r) = mono_gain(pan);
            gains[0][0] = l;
            gains[0][1] = r;
        }
        2 => {
            let (l2l, l2r, r2l, r2r) = stereo_gain(pan);
            gains[0][0] = l2l;
            gains[0][1] = l2r;
            gains[1][0] = r2l;
            gains[1][1] = r2r;
        }
        n => panic!("invalid channel count {} for pan matrix", n),
    }
    gains
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-7;

    #[test]
    fn test_mono_center_is_equal_power() {
        let (l, r) = mono_gain(0.0);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((l - expected).abs() < EPS);
        assert!((r - expected).abs() < EPS);
    }

    #[test]
    fn test_mono_extremes_mute_opposite() {
        let (l, r) = mono_gain(-1.0);
        assert!((l - 1.0).abs() < EPS);
        assert!(r.abs() < EPS);

        let (l, r) = mono_gain(1.0);
        assert!(l.abs() < EPS);
        assert!((r - 1.0).abs() < EPS);
    }

    #[test]
    fn test_mono_constant_power_across_range() {
        for i in 0..=20 {
            let pan = -1.0 + i as f32 / 10.0;
            let (l, r) = mono_gain(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5, "pan {}", pan);
        }
    }

    #[test]
    fn test_stereo_center_passthrough() {
        let (l2l, l2r, r2l, r2r) = stereo_gain(0.0);
        assert!((l2l - 1.0).abs() < EPS);
        assert!(l2r.abs() < EPS);
        assert!(r2l.abs() < EPS);
        assert!((r2r - 1.0).abs() < EPS);
    }

    #[test]
    fn test_stereo_full_left_zeroes_right_output() {
        let (_, l2r, _, r2r) = stereo_gain(-1.0);
        assert!(l2r.abs() < EPS);
        assert!(r2r.abs() < EPS);
    }

    #[test]
    fn test_stereo_full_right_zeroes_left_output() {
        let (l2l, _, r2l, _) = stereo_gain(1.0);
        assert!(l2l.abs() < EPS);
        assert!(r2l.abs() < EPS);
    }

    #[test]
    fn test_pan_clamped() {
        assert_eq!(mono_gain(-5.0), mono_gain(-1.0));
        assert_eq!(stereo_gain(7.0), stereo_gain(1.0));
    }

    #[test]
    fn test_matrix_rows() {
        let m = gain_matrix(1, 0.5);
        assert_eq!(m[1], [0.0, 0.0]);

        let m = gain_matrix(2, -0.25);
        assert!(m[0][0] > 0.0 && m[1][1] > 0.0);
    }

    #[test]
    #[should_panic(expected = "invalid channel count")]
    fn test_matrix_rejects_bad_channel_count() {
        gain_matrix(3, 0.0);
    }
}
