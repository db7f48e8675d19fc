//! Signal generators: the per-sample sources the registry hands to the audio thread.
//!
//! These are zero-allocation, per-sample components designed for realtime use.
//! Everything here is small and cheap to move; no locks, no heap.
//!
//! Contents:
//! - `Wave`, `ToneGenerator`   : periodic oscillator (Sine/Tri/Saw) with stable phase wrap
//! - `NoiseColor`, `NoiseGenerator` : seeded white or pink noise
//! - `Generator`               : tagged variant handed to the audio thread
//!
//! Parameters are validated by the constructors, so `next_sample` can never fail.

use chirp_core::dsp::{sin_cycles, wrap_phase};
use chirp_core::filters::PinkFilter;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::ParamError;

/// Anything that produces one mono sample per call.
///
/// Implementations must run in bounded constant time and must not allocate,
/// block or lock: they are called from the audio callback.
pub trait SignalGenerator {
    /// Produce the next sample and advance the internal state exactly once.
    fn next_sample(&mut self) -> f32;
}

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Wave {
    #[default]
    Sine,
    Tri,
    Saw,
}

/// Naive (non band-limited) waveforms in [-1, 1] for a phase in cycles.
#[inline]
fn wave_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine => sin_cycles(phase01),
        // starts at 0 and rises, like the sine
        Wave::Tri => {
            let p = phase01 + 0.25;
            let p = if p >= 1.0 { p - 1.0 } else { p };
            1.0 - 4.0 * (p - 0.5).abs()
        }
        Wave::Saw => {
            let p = phase01 + 0.5;
            let p = if p >= 1.0 { p - 1.0 } else { p };
            2.0 * p - 1.0
        }
    }
}

#[inline]
fn check_amplitude(amplitude: f32) -> Result<f32, ParamError> {
    if amplitude.is_finite() && (0.0..=1.0).contains(&amplitude) {
        Ok(amplitude)
    } else {
        Err(ParamError::Amplitude(amplitude))
    }
}

/// Creation parameters for a [`ToneGenerator`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneParams {
    /// Hz, must lie in (0, sample_rate / 2)
    pub frequency: f32,
    /// [0, 1]
    pub amplitude: f32,
    pub wave: Wave,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self { frequency: 440.0, amplitude: 0.5, wave: Wave::Sine }
    }
}

/// Free-running oscillator at a fixed frequency.
///
/// Phase is kept in cycles, `[0, 1)`, which is the same range as `[0, 2π)` in
/// radians without the scaling on every step.
#[derive(Copy, Clone, Debug)]
pub struct ToneGenerator {
    phase: f32,     // [0,1)
    phase_inc: f32, // frequency / sample_rate
    frequency: f32,
    amplitude: f32,
    wave: Wave,
}

impl ToneGenerator {
    pub fn new(params: ToneParams, sample_rate: f32) -> Result<Self, ParamError> {
        let nyquist = sample_rate * 0.5;
        let f = params.frequency;
        if !(f.is_finite() && f > 0.0 && f < nyquist) {
            return Err(ParamError::Frequency { frequency: f, nyquist });
        }
        Ok(Self {
            phase: 0.0,
            phase_inc: f / sample_rate,
            frequency: f,
            amplitude: check_amplitude(params.amplitude)?,
            wave: params.wave,
        })
    }

    #[inline] pub fn frequency(&self) -> f32 { self.frequency }
    #[inline] pub fn amplitude(&self) -> f32 { self.amplitude }
    #[inline] pub fn wave(&self) -> Wave { self.wave }

    /// Current phase in cycles, always in `[0, 1)`.
    #[inline] pub fn phase01(&self) -> f32 { self.phase }

    /// Period in samples (`sample_rate / frequency`).
    #[inline] pub fn period_samples(&self) -> f32 { 1.0 / self.phase_inc }
}

impl SignalGenerator for ToneGenerator {
    #[inline]
    fn next_sample(&mut self) -> f32 {
        let s = wave_sample(self.phase, self.wave) * self.amplitude;
        self.phase = wrap_phase(self.phase + self.phase_inc, 1.0);
        s
    }
}

/// Spectral colour of a [`NoiseGenerator`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NoiseColor {
    #[default]
    White,
    Pink,
}

/// Creation parameters for a [`NoiseGenerator`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// [0, 1]; every sample lies in [-amplitude, amplitude]
    pub amplitude: f32,
    pub color: NoiseColor,
    /// Fixed seed for reproducible output; drawn from the thread RNG when `None`.
    pub seed: Option<u64>,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self { amplitude: 0.5, color: NoiseColor::White, seed: None }
    }
}

/// Seeded pseudo-random noise source.
///
/// The PRNG is seeded once at construction (on the control thread); the audio
/// thread only ever advances it, which never blocks or allocates.
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    rng: SmallRng,
    amplitude: f32,
    color: NoiseColor,
    pink: PinkFilter,
}

impl NoiseGenerator {
    pub fn new(params: NoiseParams) -> Result<Self, ParamError> {
        let amplitude = check_amplitude(params.amplitude)?;
        let seed = params.seed.unwrap_or_else(rand::random);
        Ok(Self {
            rng: SmallRng::seed_from_u64(seed),
            amplitude,
            color: params.color,
            pink: PinkFilter::new(),
        })
    }

    #[inline] pub fn amplitude(&self) -> f32 { self.amplitude }
    #[inline] pub fn color(&self) -> NoiseColor { self.color }

    /// Uniform white sample in [-1, 1).
    #[inline]
    fn white(&mut self) -> f32 {
        self.rng.gen::<f32>() * 2.0 - 1.0
    }
}

impl SignalGenerator for NoiseGenerator {
    #[inline]
    fn next_sample(&mut self) -> f32 {
        let w = self.white();
        let s = match self.color {
            NoiseColor::White => w,
            NoiseColor::Pink => self.pink.process(w).clamp(-1.0, 1.0),
        };
        s * self.amplitude
    }
}

/// Which logical signal a generator produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Tone,
    Noise,
}

/// Creation request for [`GeneratorRegistry::create`](crate::registry::GeneratorRegistry::create).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GeneratorParams {
    Tone(ToneParams),
    Noise(NoiseParams),
}

impl GeneratorParams {
    #[inline]
    pub fn kind(&self) -> GeneratorKind {
        match self {
            GeneratorParams::Tone(_) => GeneratorKind::Tone,
            GeneratorParams::Noise(_) => GeneratorKind::Noise,
        }
    }

    /// Build the generator. Called on the control thread.
    pub fn build(self, sample_rate: f32) -> Result<Generator, ParamError> {
        Ok(match self {
            GeneratorParams::Tone(p) => Generator::Tone(ToneGenerator::new(p, sample_rate)?),
            GeneratorParams::Noise(p) => Generator::Noise(NoiseGenerator::new(p)?),
        })
    }
}

/// A fully constructed generator, moved by value onto the audio thread.
///
/// Holds no heap memory, so dropping one on the audio thread never frees.
#[derive(Clone, Debug)]
pub enum Generator {
    Tone(ToneGenerator),
    Noise(NoiseGenerator),
    #[cfg(test)]
    #[doc(hidden)]
    Glitch(GlitchGenerator),
}

/// Constant 0.5 output with a single NaN at sample `at`.
#[cfg(test)]
#[doc(hidden)]
#[derive(Copy, Clone, Debug)]
pub struct GlitchGenerator {
    n: u32,
    at: u32,
}

#[cfg(test)]
impl GlitchGenerator {
    pub(crate) fn new(at: u32) -> Self {
        Self { n: 0, at }
    }
}

#[cfg(test)]
impl SignalGenerator for GlitchGenerator {
    fn next_sample(&mut self) -> f32 {
        let s = if self.n == self.at { f32::NAN } else { 0.5 };
        self.n += 1;
        s
    }
}

impl Generator {
    #[inline]
    pub fn kind(&self) -> GeneratorKind {
        match self {
            Generator::Tone(_) => GeneratorKind::Tone,
            Generator::Noise(_) => GeneratorKind::Noise,
            #[cfg(test)]
            Generator::Glitch(_) => GeneratorKind::Tone,
        }
    }
}

impl SignalGenerator for Generator {
    #[inline]
    fn next_sample(&mut self) -> f32 {
        match self {
            Generator::Tone(t) => t.next_sample(),
            Generator::Noise(n) => n.next_sample(),
            #[cfg(test)]
            Generator::Glitch(g) => g.next_sample(),
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44_100.0;

    fn tone(freq: f32, wave: Wave) -> ToneGenerator {
        ToneGenerator::new(ToneParams { frequency: freq, amplitude: 1.0, wave }, SR).unwrap()
    }

    fn rising_zero_crossings(samples: &[f32]) -> Vec<usize> {
        samples
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
            .map(|(i, _)| i + 1)
            .collect()
    }

    #[test]
    fn tone_440_crosses_zero_every_100_samples() {
        let mut t = tone(440.0, Wave::Sine);
        let out: Vec<f32> = (0..4410).map(|_| t.next_sample()).collect();
        assert_eq!(out[0], 0.0);

        let crossings = rising_zero_crossings(&out);
        assert!(crossings.len() >= 40, "crossings={}", crossings.len());
        for pair in crossings.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap == 100 || gap == 101, "gap={gap}");
        }
        let span = (crossings[crossings.len() - 1] - crossings[0]) as f32;
        let mean = span / (crossings.len() - 1) as f32;
        assert!((mean - SR / 440.0).abs() < 0.05, "mean={mean}");
    }

    #[test]
    fn tone_first_hundred_samples_cross_once() {
        // one full cycle of 440 Hz is ~100.2 samples
        let mut t = tone(440.0, Wave::Sine);
        let out: Vec<f32> = (0..100).map(|_| t.next_sample()).collect();
        let falling = out.windows(2).filter(|w| w[0] > 0.0 && w[1] <= 0.0).count();
        assert_eq!(falling, 1);
        assert!(out[25] > 0.99, "peak near sample 25: {}", out[25]);
    }

    #[test]
    fn tone_is_periodic_and_bounded() {
        // 441 Hz at 44.1 kHz repeats every 100 samples exactly
        for wave in [Wave::Sine, Wave::Tri, Wave::Saw] {
            let mut t = tone(441.0, wave);
            assert!((t.period_samples() - 100.0).abs() < 1e-3);
            let out: Vec<f32> = (0..1200).map(|_| t.next_sample()).collect();
            for n in 0..1000 {
                // saw jumps at the wrap, so skip samples right at the edge
                let d = (out[n] - out[n + 100]).abs();
                assert!(d < 1e-3 || (wave == Wave::Saw && d > 1.9), "{wave:?} n={n} d={d}");
            }
            assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)), "{wave:?} out of range");
        }
    }

    #[test]
    fn tone_phase_stays_wrapped_over_long_runs() {
        let mut t = tone(12_345.0, Wave::Sine);
        for _ in 0..(SR as usize * 10) {
            t.next_sample();
            assert!((0.0..1.0).contains(&t.phase01()));
        }
    }

    #[test]
    fn tone_rejects_bad_frequency() {
        for f in [-440.0, 0.0, 22_050.0, 30_000.0, f32::NAN, f32::INFINITY] {
            let r = ToneGenerator::new(ToneParams { frequency: f, ..ToneParams::default() }, SR);
            assert!(matches!(r, Err(ParamError::Frequency { .. })), "f={f}");
        }
    }

    #[test]
    fn tone_rejects_bad_amplitude() {
        let r = ToneGenerator::new(ToneParams { amplitude: 1.5, ..ToneParams::default() }, SR);
        assert_eq!(r.unwrap_err(), ParamError::Amplitude(1.5));
    }

    #[test]
    fn white_noise_mean_is_near_zero_and_bounded() {
        for amp in [1.0, 0.3] {
            let mut n = NoiseGenerator::new(NoiseParams { amplitude: amp, color: NoiseColor::White, seed: Some(7) }).unwrap();
            let mut sum = 0.0_f64;
            for _ in 0..20_000 {
                let s = n.next_sample();
                assert!(s >= -amp && s <= amp, "s={s}");
                sum += f64::from(s);
            }
            let mean = sum / 20_000.0;
            assert!(mean.abs() < 0.05 * f64::from(amp), "mean={mean}");
        }
    }

    #[test]
    fn pink_noise_is_bounded() {
        let mut n = NoiseGenerator::new(NoiseParams { amplitude: 0.8, color: NoiseColor::Pink, seed: Some(99) }).unwrap();
        let mut sum = 0.0_f64;
        for _ in 0..50_000 {
            let s = n.next_sample();
            assert!((-0.8..=0.8).contains(&s), "s={s}");
            sum += f64::from(s);
        }
        assert!((sum / 50_000.0).abs() < 0.2);
    }

    #[test]
    fn noise_is_deterministic_for_a_seed() {
        let p = NoiseParams { seed: Some(1234), ..NoiseParams::default() };
        let mut a = NoiseGenerator::new(p).unwrap();
        let mut b = NoiseGenerator::new(p).unwrap();
        for _ in 0..256 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn noise_rejects_bad_amplitude() {
        let r = NoiseGenerator::new(NoiseParams { amplitude: -0.1, ..NoiseParams::default() });
        assert!(matches!(r, Err(ParamError::Amplitude(_))));
    }

    #[test]
    fn params_build_matching_kind() {
        let g = GeneratorParams::Tone(ToneParams::default()).build(SR).unwrap();
        assert_eq!(g.kind(), GeneratorKind::Tone);
        let g = GeneratorParams::Noise(NoiseParams::default()).build(SR).unwrap();
        assert_eq!(g.kind(), GeneratorKind::Noise);
        assert_eq!(GeneratorParams::Noise(NoiseParams::default()).kind(), GeneratorKind::Noise);
    }
}
