//! Control surface: the four start/stop operations a UI wires its buttons to.
//!
//! The surface tracks at most one live handle per logical signal, so a second
//! `start_*` while the signal is playing is a no-op and a `stop_*` with nothing
//! playing is a no-op too.

use tracing::info;

use crate::config::VoiceConfig;
use crate::error::RegistryError;
use crate::generators::GeneratorParams;
use crate::registry::{GeneratorHandle, GeneratorRegistry};

#[derive(Debug)]
pub struct ControlSurface {
    registry: GeneratorRegistry,
    voices: VoiceConfig,
    beep: Option<GeneratorHandle>,
    noise: Option<GeneratorHandle>,
}

impl ControlSurface {
    pub fn new(registry: GeneratorRegistry, voices: VoiceConfig) -> Self {
        Self { registry, voices, beep: None, noise: None }
    }

    /// Start the beep tone, or return the handle of the one already playing.
    pub fn start_beep(&mut self) -> Result<GeneratorHandle, RegistryError> {
        let params = GeneratorParams::Tone(self.voices.beep);
        let handle = start(&mut self.registry, &mut self.beep, params)?;
        info!(?handle, frequency = self.voices.beep.frequency, "beep playing");
        Ok(handle)
    }

    /// Stop the beep if it is playing.
    pub fn stop_beep(&mut self) {
        if stop(&mut self.registry, &mut self.beep) {
            info!("beep stopped");
        }
    }

    /// Start white noise, or return the handle of the noise already playing.
    pub fn start_white_noise(&mut self) -> Result<GeneratorHandle, RegistryError> {
        let params = GeneratorParams::Noise(self.voices.noise);
        let handle = start(&mut self.registry, &mut self.noise, params)?;
        info!(?handle, color = ?self.voices.noise.color, "noise playing");
        Ok(handle)
    }

    /// Stop the noise if it is playing.
    pub fn stop_white_noise(&mut self) {
        if stop(&mut self.registry, &mut self.noise) {
            info!("noise stopped");
        }
    }

    /// Release any generator by handle. If it is the tracked beep or noise,
    /// that signal counts as stopped.
    pub fn release(&mut self, handle: GeneratorHandle) -> bool {
        for tracked in [&mut self.beep, &mut self.noise] {
            if *tracked == Some(handle) {
                *tracked = None;
            }
        }
        self.registry.remove(handle)
    }

    pub fn stop_all(&mut self) {
        self.stop_beep();
        self.stop_white_noise();
    }

    #[inline] pub fn beep_handle(&self) -> Option<GeneratorHandle> { self.beep }
    #[inline] pub fn noise_handle(&self) -> Option<GeneratorHandle> { self.noise }
    #[inline] pub fn is_beeping(&self) -> bool { self.beep.is_some_and(|h| self.registry.contains(h)) }
    #[inline] pub fn is_noising(&self) -> bool { self.noise.is_some_and(|h| self.registry.contains(h)) }

    #[inline] pub fn voices(&self) -> &VoiceConfig { &self.voices }
    #[inline] pub fn registry(&self) -> &GeneratorRegistry { &self.registry }
    #[inline] pub fn registry_mut(&mut self) -> &mut GeneratorRegistry { &mut self.registry }
}

fn start(
    registry: &mut GeneratorRegistry,
    tracked: &mut Option<GeneratorHandle>,
    params: GeneratorParams,
) -> Result<GeneratorHandle, RegistryError> {
    // a handle released behind our back through `registry_mut` is forgotten
    if let Some(h) = *tracked {
        if registry.contains(h) {
            return Ok(h);
        }
    }
    let handle = registry.create(params)?;
    *tracked = Some(handle);
    Ok(handle)
}

fn stop(registry: &mut GeneratorRegistry, tracked: &mut Option<GeneratorHandle>) -> bool {
    match tracked.take() {
        Some(h) => registry.remove(h),
        None => false,
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::generators::GeneratorKind;
    use crate::render::Renderer;

    fn surface(max: usize) -> (ControlSurface, Renderer) {
        let (reg, r) = GeneratorRegistry::new(&EngineConfig::default().with_max_generators(max)).unwrap();
        (ControlSurface::new(reg, VoiceConfig::default()), r)
    }

    #[test]
    fn double_start_keeps_one_tone() {
        let (mut c, _r) = surface(4);
        let a = c.start_beep().unwrap();
        let b = c.start_beep().unwrap();
        assert_eq!(a, b);
        assert_eq!(c.registry().active_count(GeneratorKind::Tone), 1);
        assert_eq!(c.registry().len(), 1);
    }

    #[test]
    fn start_stop_stop_leaves_registry_empty() {
        let (mut c, _r) = surface(4);
        c.start_beep().unwrap();
        c.stop_beep();
        c.stop_beep();
        assert!(c.registry().is_empty());
        assert!(!c.is_beeping());
    }

    #[test]
    fn stopping_beep_does_not_touch_noise() {
        let (mut c, _r) = surface(4);
        let n = c.start_white_noise().unwrap();
        c.start_beep().unwrap();
        c.stop_beep();
        c.stop_beep();
        assert!(c.is_noising());
        assert!(c.registry().contains(n));
        assert_eq!(c.registry().active_count(GeneratorKind::Noise), 1);
        assert_eq!(c.registry().active_count(GeneratorKind::Tone), 0);
    }

    #[test]
    fn at_most_one_generator_per_kind_under_any_sequence() {
        let (mut c, mut r) = surface(8);
        let mut out = [0.0_f32; 32];
        // deterministic pseudo-random walk over the four operations
        let mut x: u32 = 0x9E37_79B9;
        for _ in 0..2000 {
            // keep the command queue drained, as the audio callback would
            r.render_mono(&mut out);
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            match x % 4 {
                0 => { c.start_beep().unwrap(); }
                1 => c.stop_beep(),
                2 => { c.start_white_noise().unwrap(); }
                _ => c.stop_white_noise(),
            }
            let reg = c.registry();
            assert!(reg.active_count(GeneratorKind::Tone) <= 1);
            assert!(reg.active_count(GeneratorKind::Noise) <= 1);
            assert_eq!(reg.active_count(GeneratorKind::Tone), usize::from(c.is_beeping()));
            assert_eq!(reg.active_count(GeneratorKind::Noise), usize::from(c.is_noising()));
        }
    }

    #[test]
    fn capacity_one_rejects_the_second_signal() {
        let (mut c, _r) = surface(1);
        c.start_beep().unwrap();
        assert_eq!(c.start_white_noise(), Err(RegistryError::CapacityExceeded { max: 1 }));
        assert!(!c.is_noising());
        assert_eq!(c.registry().len(), 1);
    }

    #[test]
    fn handle_released_elsewhere_is_restarted() {
        let (mut c, _r) = surface(2);
        let h = c.start_beep().unwrap();
        c.registry_mut().remove(h);
        let h2 = c.start_beep().unwrap();
        assert_ne!(h, h2);
        assert_eq!(c.registry().len(), 1);
    }

    #[test]
    fn releasing_the_tracked_handle_stops_that_signal() {
        let (mut c, _r) = surface(4);
        let b = c.start_beep().unwrap();
        let n = c.start_white_noise().unwrap();
        assert!(c.release(b));
        assert!(!c.is_beeping());
        assert_eq!(c.beep_handle(), None);
        assert!(c.is_noising());
        assert!(!c.release(b));
        c.stop_beep();
        assert_eq!(c.registry().len(), 1);
        assert!(c.registry().contains(n));
    }
}
