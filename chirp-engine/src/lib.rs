//! chirp Engine: tone/noise generators, handle registry, audio sink and control surface.
//!
//! Crate layout:
//! - [`generators`] : `SignalGenerator` trait, tone and noise generators
//! - [`registry`]   : control-thread half of the registry and opaque handles
//! - [`render`]     : audio-thread half (`Renderer`), mixing and stats
//! - [`control`]    : start/stop surface with one handle per signal
//! - [`config`]     : engine and voice configuration
//! - [`output`]     : cpal device output (feature `realtime`)
//!
//! The two registry halves talk over a lock-free SPSC queue; the audio thread
//! never allocates, blocks or locks.

pub mod config;
pub mod control;
pub mod error;
pub mod generators;
pub mod registry;
pub mod render;

#[cfg(feature = "realtime")]
pub mod output;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::{EngineConfig, MixPolicy, VoiceConfig};
pub use control::ControlSurface;
pub use error::{ConfigError, ParamError, RegistryError};
pub use generators::{
    Generator, GeneratorKind, GeneratorParams, NoiseColor, NoiseGenerator, NoiseParams,
    SignalGenerator, ToneGenerator, ToneParams, Wave,
};
pub use registry::{GeneratorHandle, GeneratorRegistry};
pub use render::{RenderStats, Renderer, StatsSnapshot, MAX_BLOCK};

#[cfg(feature = "realtime")]
pub use output::{list_output_devices, AudioOutput, OutputError};

/// Build a control surface and its renderer in one step.
pub fn engine(config: &EngineConfig, voices: VoiceConfig) -> Result<(ControlSurface, Renderer), ConfigError> {
    let (registry, renderer) = GeneratorRegistry::new(config)?;
    Ok((ControlSurface::new(registry, voices), renderer))
}
