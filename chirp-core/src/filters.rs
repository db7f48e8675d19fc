//! Filters: leaky-integrator noise shaping.
//!
//! Contents
//! - `Leaky`      : one-pole leaky integrator `y = p*y + g*x`
//! - `PinkFilter` : white → pink (-3 dB/oct) shaper built from three `Leaky` stages
//!
//! Notes
//! - Pole/gain pairs follow Paul Kellet's "economy" pink filter, which is
//!   accurate to about ±0.5 dB above ~10 Hz at 44.1 kHz.
//! - Everything is `Copy`, allocation free and safe to run per sample.

use crate::dsp::kill_denormals;

/// One-pole leaky integrator: `y[n] = pole * y[n-1] + gain * x[n]`.
#[derive(Copy, Clone, Debug)]
pub struct Leaky {
    pole: f32,
    gain: f32,
    y: f32,
}

impl Leaky {
    #[inline]
    pub fn new(pole: f32, gain: f32) -> Self {
        Self { pole: pole.clamp(0.0, 0.999_999), gain, y: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y = kill_denormals(self.pole * self.y + self.gain * x);
        self.y
    }

    #[inline] pub fn value(&self) -> f32 { self.y }
}

/// Output scale that keeps pink noise from uniform white input mostly inside ±1.
const PINK_SCALE: f32 = 0.25;

/// White → pink noise shaper.
#[derive(Copy, Clone, Debug)]
pub struct PinkFilter {
    b0: Leaky,
    b1: Leaky,
    b2: Leaky,
}

impl Default for PinkFilter {
    fn default() -> Self { Self::new() }
}

impl PinkFilter {
    #[inline]
    pub fn new() -> Self {
        Self {
            b0: Leaky::new(0.997_65, 0.099_046),
            b1: Leaky::new(0.963_00, 0.296_516_4),
            b2: Leaky::new(0.570_00, 1.052_691_3),
        }
    }

    /// Shape one white sample (expected in [-1, 1]). The result is not clamped.
    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        let sum = self.b0.process(white) + self.b1.process(white) + self.b2.process(white)
            + white * 0.184_8;
        sum * PINK_SCALE
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaky_settles_at_dc_gain() {
        let mut l = Leaky::new(0.5, 0.5);
        let mut y = 0.0;
        for _ in 0..200 {
            y = l.process(1.0);
        }
        // gain / (1 - pole)
        assert!((y - 1.0).abs() < 1e-4, "y={y}");
    }

    #[test]
    fn pink_has_more_low_than_high_energy() {
        // Alternating ±1 is pure Nyquist; a constant is pure DC.
        let mut hi = PinkFilter::new();
        let mut lo = PinkFilter::new();
        let mut e_hi = 0.0;
        let mut e_lo = 0.0;
        for n in 0..4096 {
            let s = if n % 2 == 0 { 0.1 } else { -0.1 };
            let a = hi.process(s);
            let b = lo.process(0.1);
            if n > 2048 {
                e_hi += a * a;
                e_lo += b * b;
            }
        }
        assert!(e_lo > 10.0 * e_hi, "lo={e_lo} hi={e_hi}");
    }
}
