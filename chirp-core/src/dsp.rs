//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Side-effect free helpers that never allocate
//!
//! Features used by this file:
//! - `fast-math` : polynomial/rational approximations for sine and tanh
//! - `simd`      : `wide::f32x8` lanes for the block helpers
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;
use num_traits::Float;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tanh(x: f32) -> f32 { x.tanh() }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] fn m_tanh(x: f32) -> f32 { libm::tanhf(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tanh(x: f32) -> f32 { x.tanh() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (one full oscillator cycle in radians)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Valid output range of a mixed sample.
pub const OUTPUT_MIN: f32 = -1.0;
pub const OUTPUT_MAX: f32 = 1.0;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

/// Wrap `p` into `[0, period)`.
///
/// Works for any float width; oscillators call it with `period = 1` (cycles)
/// but `TAU` (radians) is equally valid.
#[inline]
pub fn wrap_phase<F: Float>(p: F, period: F) -> F {
    let r = p - (p / period).floor() * period;
    // `floor` rounding can leave r == period for tiny negative inputs
    if r >= period || r < F::zero() { F::zero() } else { r }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 } else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Sine of `x` radians.
///
/// With `fast-math` the argument is reduced to [-π/2, π/2] and evaluated with a
/// 7th-order odd polynomial (max abs error ~2e-4, |y| <= 1.0002). Exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    if cfg!(feature = "fast-math") {
        let half_pi = PI * 0.5;
        let mut xr = x - (x / TAU).round() * TAU; // [-π, π]
        if xr > half_pi {
            xr = PI - xr;
        } else if xr < -half_pi {
            xr = -PI - xr;
        }
        let x2 = xr * xr;
        xr * (1.0 + x2 * (-1.0 / 6.0 + x2 * (1.0 / 120.0 - x2 * (1.0 / 5040.0))))
    } else {
        m_sin(x)
    }
}

/// Sine of a normalized phase in cycles (`phase01 = 0.25` is the positive peak).
#[inline]
pub fn sin_cycles(phase01: f32) -> f32 {
    fast_sin(TAU * phase01)
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. If `fast-math` is enabled, uses a stable rational approximation.
///
/// Approximation used when `fast-math`:
/// `tanh(x) ≈ x * (27 + x^2) / (27 + 9 x^2)`, clamped to ±1 since the rational
/// form overshoots slightly past |x| = 3.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if cfg!(feature = "fast-math") {
        let x2 = x * x;
        let num = x * (27.0 + x2);
        let den = 27.0 + 9.0 * x2;
        clamp(num / den, OUTPUT_MIN, OUTPUT_MAX)
    } else {
        m_tanh(x)
    }
}

// --------------------------------- Block helpers ---------------------------------

/// In-place gain.
#[inline]
pub fn scale_in_place(buf: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for x in buf.iter_mut() {
        *x *= gain;
    }
}

/// Clamp every sample of `buf` into `[lo, hi]`. NaN becomes `lo`.
#[cfg(feature = "simd")]
#[inline]
pub fn clamp_block(buf: &mut [f32], lo: f32, hi: f32) {
    use wide::f32x8;
    let vlo = f32x8::splat(lo);
    let vhi = f32x8::splat(hi);
    let mut chunks = buf.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut lanes = [0.0_f32; 8];
        lanes.copy_from_slice(chunk);
        let v = f32x8::from(lanes);
        // lanes that are NaN fail `v == v` and are forced to `lo`
        let clamped = v.is_nan().blend(vlo, v.max(vlo).min(vhi));
        chunk.copy_from_slice(&clamped.to_array());
    }
    for x in chunks.into_remainder() {
        *x = clamp_scalar(*x, lo, hi);
    }
}

/// Clamp every sample of `buf` into `[lo, hi]`. NaN becomes `lo`.
#[cfg(not(feature = "simd"))]
#[inline]
pub fn clamp_block(buf: &mut [f32], lo: f32, hi: f32) {
    for x in buf.iter_mut() {
        *x = clamp_scalar(*x, lo, hi);
    }
}

#[inline]
fn clamp_scalar(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() { lo } else { clamp(x, lo, hi) }
}

/// Apply [`soft_clip`] to every sample of `buf`.
#[inline]
pub fn soft_clip_block(buf: &mut [f32]) {
    for x in buf.iter_mut() {
        *x = soft_clip(*x);
    }
}

// --------------------------------- Tests (std only) ------------------------------
