//! Error types for the control side of the engine.
//!
//! Nothing in here is ever produced on the audio thread: real-time conditions
//! (overruns, generator faults) are counted in [`RenderStats`](crate::render::RenderStats)
//! instead of being returned.

use thiserror::Error;

/// Generator parameters rejected at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParamError {
    #[error("frequency {frequency} Hz is outside (0, {nyquist}) for this sample rate")]
    Frequency { frequency: f32, nyquist: f32 },
    #[error("amplitude {0} is outside [0, 1]")]
    Amplitude(f32),
}

/// Failure of a registry mutation issued from the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RegistryError {
    #[error("generator capacity exceeded (max {max} concurrent generators)")]
    CapacityExceeded { max: usize },
    #[error("invalid generator parameters: {0}")]
    InvalidParams(#[from] ParamError),
    #[error("master gain {0} must be finite and in [0, 4]")]
    Gain(f32),
}

/// Engine configuration rejected by [`EngineConfig::validate`](crate::config::EngineConfig::validate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate {0} Hz is outside 8000..=384000")]
    SampleRate(u32),
    #[error("channel count must be at least 1")]
    Channels,
    #[error("max generators must be in 1..={max}, got {got}")]
    Capacity { got: usize, max: usize },
    #[error("master gain {0} must be finite and in [0, 4]")]
    Gain(f32),
    #[error("declick time {0} ms must be finite and in [0, 50]")]
    Declick(f32),
    #[error("command queue capacity must be at least 2, got {0}")]
    QueueCapacity(usize),
}

/// Handle rejected by `remove`. Internal only: removal of an unknown handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handle does not refer to a live generator")]
pub(crate) struct InvalidHandle;
