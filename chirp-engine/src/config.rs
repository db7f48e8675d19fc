//! Engine and voice configuration.
//!
//! Everything here has a sane default; callers (CLI flags, the C ABI) override
//! individual fields through the `with_*` builders and then [`EngineConfig::validate`].

use crate::error::ConfigError;
use crate::generators::{NoiseParams, ToneParams};

/// Largest number of concurrent generators a registry may be configured for.
pub const MAX_GENERATORS_LIMIT: usize = 1024;

/// How the summed generator output is forced into [-1, 1].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MixPolicy {
    /// Hard clamp. Transparent until the sum actually exceeds the range.
    #[default]
    Clamp,
    /// `tanh` saturation. Never clips hard but colours loud mixes.
    SoftClip,
}

/// Static engine configuration, fixed for the lifetime of a registry/renderer pair.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Channels the engine declares; the mono mix is duplicated to each.
    pub channels: u16,
    /// Ceiling on live generators; `create` fails with `CapacityExceeded` beyond it.
    pub max_generators: usize,
    /// Linear gain applied to the sum before the mix policy.
    pub master_gain: f32,
    pub mix_policy: MixPolicy,
    /// Fade-in/fade-out time on start/stop, in milliseconds (0 = hard cut).
    pub declick_ms: f32,
    /// Slots in the control → audio command queue.
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            max_generators: 8,
            master_gain: 1.0,
            mix_policy: MixPolicy::Clamp,
            declick_ms: 2.0,
            command_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sr: u32) -> Self { self.sample_rate = sr; self }
    pub fn with_channels(mut self, ch: u16) -> Self { self.channels = ch; self }
    pub fn with_max_generators(mut self, n: usize) -> Self { self.max_generators = n; self }
    pub fn with_master_gain(mut self, g: f32) -> Self { self.master_gain = g; self }
    pub fn with_mix_policy(mut self, p: MixPolicy) -> Self { self.mix_policy = p; self }
    pub fn with_declick_ms(mut self, ms: f32) -> Self { self.declick_ms = ms; self }
    pub fn with_command_capacity(mut self, n: usize) -> Self { self.command_capacity = n; self }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8_000..=384_000).contains(&self.sample_rate) {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(ConfigError::Channels);
        }
        if !(1..=MAX_GENERATORS_LIMIT).contains(&self.max_generators) {
            return Err(ConfigError::Capacity { got: self.max_generators, max: MAX_GENERATORS_LIMIT });
        }
        if !valid_gain(self.master_gain) {
            return Err(ConfigError::Gain(self.master_gain));
        }
        if !(self.declick_ms.is_finite() && (0.0..=50.0).contains(&self.declick_ms)) {
            return Err(ConfigError::Declick(self.declick_ms));
        }
        if self.command_capacity < 2 {
            return Err(ConfigError::QueueCapacity(self.command_capacity));
        }
        Ok(())
    }

    #[inline]
    pub fn sample_rate_f32(&self) -> f32 {
        self.sample_rate as f32
    }
}

/// Master gain accepted by the engine: finite, in [0, 4].
#[inline]
pub(crate) fn valid_gain(g: f32) -> bool {
    g.is_finite() && (0.0..=4.0).contains(&g)
}

/// What the control surface plays for each logical signal.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct VoiceConfig {
    pub beep: ToneParams,
    pub noise: NoiseParams,
}
