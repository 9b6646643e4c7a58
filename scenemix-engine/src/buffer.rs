//! Per-sample buffer operations
//!
//! One buffer holds one channel's worth of 32-bit float samples. Values are
//! nominally in [-1, 1] but the mixer never clamps; limiting is the output
//! stage's job, which keeps everything in here linear.
//!
//! All operations work in place on the destination and never allocate. The
//! mixing variants stop at the shorter of the two slices. Ramp endpoints for
//! [`mix_sqrt_ramp`] are *squared* gains: the square root undoes the square,
//! which yields an equal-power fade from a single pass over the samples.

/// A single channel of f32 samples.
pub type Buffer = Vec<f32>;

/// Create a zeroed buffer of `length` samples.
pub fn new_buffer(length: usize) -> Buffer {
    vec![0.0; length]
}

/// Fill `dst` with silence.
pub fn zero(dst: &mut [f32]) {
    dst.fill(0.0);
}

/// Scale every sample of `dst` by `gain`.
pub fn gain(dst: &mut [f32], gain: f32) {
    for v in dst.iter_mut() {
        *v *= gain;
    }
}

/// Copy `src` into `dst`, scaling by `gain`. Stops at the shorter slice.
pub fn copy_gain(dst: &mut [f32], src: &[f32], gain: f32) {
    let n = dst.len().min(src.len());
    for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
        *d = s * gain;
    }
}

/// Add `src` into `dst`. Stops at the shorter slice.
pub fn mix(dst: &mut [f32], src: &[f32]) {
    let n = dst.len().min(src.len());
    for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
        *d += s;
    }
}

/// Add `src` scaled by `gain` into `dst`. Stops at the shorter slice.
pub fn mix_gain(dst: &mut [f32], src: &[f32], gain: f32) {
    let n = dst.len().min(src.len());
    for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
        *d += s * gain;
    }
}

/// Scale `dst` by a gain moving linearly from `initial` to `target`
/// across its length.
pub fn linear_ramp(dst: &mut [f32], initial: f32, target: f32) {
    if dst.is_empty() {
        return;
    }
    let delta = (target - initial) / dst.len() as f32;
    let mut g = initial;
    for v in dst.iter_mut() {
        *v *= g;
        g += delta;
    }
}

/// Scale `dst` by `sqrt` of a gain moving linearly from `initial` to
/// `target`. Callers pass squared endpoints, so the audible gain follows an
/// equal-power curve.
pub fn sqrt_ramp(dst: &mut [f32], initial: f32, target: f32) {
    if dst.is_empty() {
        return;
    }
    let a = (target - initial) / dst.len() as f32;
    for (i, v) in dst.iter_mut().enumerate() {
        *v *= (a * i as f32 + initial).sqrt();
    }
}

/// Fused ramped mix: add `src` scaled by the sqrt-ramp gain into `dst` in
/// one pass. Stops at the shorter slice; the ramp spans that length.
pub fn mix_sqrt_ramp(dst: &mut [f32], src: &[f32], initial: f32, target: f32) {
    let n = dst.len().min(src.len());
    if n == 0 {
        return;
    }
    let a = (target - initial) / n as f32;
    for i in 0..n {
        dst[i] += src[i] * (a * i as f32 + initial).sqrt();
    }
}
