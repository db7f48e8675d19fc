//! Gate envelopes used to declick voices on start and stop.
//!
//! Provided envelopes:
//! - `GateRamp` : linear attack/release ramp driven by a gate (no sustain shaping)
//!
//! All envelopes are `no_std` friendly and avoid heap allocations.
//! Each exposes a per-sample `next()` tick and simple gate control.

#[cfg(not(feature = "std"))]
use num_traits::Float;
use crate::dsp::clamp;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RampStage {
    Idle,
    Rising,
    Open,
    Falling,
}

/// Linear gate ramp.
///
/// `gate_on` ramps the level to 1 over `ramp_ms`, `gate_off` ramps it back to 0
/// over the same time. A ramp time of 0 ms switches instantly.
#[derive(Copy, Clone, Debug)]
pub struct GateRamp {
    ramp_ms: f32,
    sr:      f32,
    level:   f32,
    samples: u32,
    step:    f32,
    stage:   RampStage,
}

impl GateRamp {
    #[inline]
    pub fn new(ramp_ms: f32, sr: f32) -> Self {
        let mut s = Self {
            ramp_ms: ramp_ms.max(0.0),
            sr: sr.max(1.0),
            level: 0.0,
            samples: 1,
            step: 1.0,
            stage: RampStage::Idle,
        };
        s.recalc_step();
        s
    }

    #[inline]
    fn recalc_step(&mut self) {
        let samples = (self.ramp_ms * 0.001 * self.sr).round();
        self.samples = if samples <= 1.0 { 1 } else { samples as u32 };
        self.step = 1.0 / self.samples as f32;
    }

    /// Number of samples a full ramp takes (at least 1).
    #[inline]
    pub fn ramp_samples(&self) -> u32 {
        self.samples
    }

    #[inline]
    pub fn gate_on(&mut self) {
        self.stage = if self.level >= 1.0 { RampStage::Open } else { RampStage::Rising };
    }

    #[inline]
    pub fn gate_off(&mut self) {
        self.stage = if self.level <= 0.0 { RampStage::Idle } else { RampStage::Falling };
    }

    /// Advance by **one sample** and return the level to apply to that sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.stage {
            RampStage::Idle => {
                self.level = 0.0;
            }
            RampStage::Rising => {
                self.level = clamp(self.level + self.step, 0.0, 1.0);
                if self.level >= 1.0 {
                    self.stage = RampStage::Open;
                }
            }
            RampStage::Open => {
                self.level = 1.0;
            }
            RampStage::Falling => {
                self.level = clamp(self.level - self.step, 0.0, 1.0);
                if self.level <= 0.0 {
                    self.stage = RampStage::Idle;
                }
            }
        }
        self.level
    }

    #[inline] pub fn value(&self) -> f32 { self.level }

    /// True when the gate is closed and the level has reached zero.
    #[inline] pub fn is_idle(&self) -> bool { self.stage == RampStage::Idle }

    /// True after `gate_off` until the level reaches zero.
    #[inline] pub fn is_releasing(&self) -> bool { self.stage == RampStage::Falling }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_rises_then_falls_to_idle() {
        let sr = 48000.0;
        let mut g = GateRamp::new(1.0, sr); // 48 samples
        assert_eq!(g.ramp_samples(), 48);
        g.gate_on();
        let mut last = 0.0;
        for _ in 0..48 {
            let v = g.next();
            assert!(v >= last);
            last = v;
        }
        assert!((g.value() - 1.0).abs() < 1e-4, "level={}", g.value());
        assert!(!g.is_idle());

        g.gate_off();
        assert!(g.is_releasing());
        for _ in 0..49 {
            g.next();
        }
        assert!(g.is_idle());
        assert_eq!(g.value(), 0.0);
    }

    #[test]
    fn zero_ramp_is_instant() {
        let mut g = GateRamp::new(0.0, 44100.0);
        g.gate_on();
        assert_eq!(g.next(), 1.0);
        g.gate_off();
        assert_eq!(g.next(), 0.0);
        assert!(g.is_idle());
    }

    #[test]
    fn gate_off_before_any_level_is_idle_immediately() {
        let mut g = GateRamp::new(5.0, 44100.0);
        g.gate_off();
        assert!(g.is_idle());
        assert_eq!(g.next(), 0.0);
    }
}
