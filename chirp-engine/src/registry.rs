//! Generator registry, control-thread half.
//!
//! The registry is split in two the way a ring buffer is split into producer
//! and consumer:
//!
//! - [`GeneratorRegistry`] lives on the control thread. It owns slot
//!   allocation, handle generations and per-kind bookkeeping, and may allocate
//!   or block freely.
//! - [`Renderer`] lives on the audio thread. It owns the generator state in a
//!   pre-allocated slot arena and never allocates, blocks or locks.
//!
//! Every insert and release travels from the first to the second as a
//! [`Command`] over a lock-free SPSC queue. The renderer drains that queue only
//! between callbacks, so each callback sees one consistent set of fully
//! constructed generators. Master gain bypasses the queue through an atomic.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{debug, trace, warn};

use crate::config::{valid_gain, EngineConfig};
use crate::error::{ConfigError, InvalidHandle, RegistryError};
use crate::generators::{Generator, GeneratorKind, GeneratorParams};
use crate::render::{RenderStats, Renderer, SharedGain};

/// Opaque token for one live generator.
///
/// A handle names a slot plus the generation that slot had when the generator
/// was created. Releasing the generator bumps the generation, so an old handle
/// can never reach a newer generator that reuses the slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct GeneratorHandle {
    slot: u32,
    generation: u32,
}

impl GeneratorHandle {
    /// Pack into a non-zero integer for C callers.
    #[inline]
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.slot)
    }

    /// Inverse of [`to_raw`](Self::to_raw). `0` (and any zero generation) is never a handle.
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        let generation = (raw >> 32) as u32;
        if generation == 0 {
            return None;
        }
        Some(Self { slot: raw as u32, generation })
    }

    #[cfg(test)]
    pub(crate) fn slot(self) -> u32 {
        self.slot
    }
}

impl fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeneratorHandle({}v{})", self.slot, self.generation)
    }
}

/// Control → audio message.
#[derive(Debug)]
pub(crate) enum Command {
    /// Place a new generator into `slot` and fade it in.
    Insert { slot: u32, generator: Generator },
    /// Fade out and retire whatever occupies `slot`.
    Release { slot: u32 },
}

#[derive(Copy, Clone, Debug)]
struct SlotState {
    generation: u32,
    kind: Option<GeneratorKind>,
}

/// Control-thread view of the live generators.
pub struct GeneratorRegistry {
    producer: HeapProd<Command>,
    slots: Vec<SlotState>,
    free: Vec<u32>,
    live: usize,
    sample_rate: f32,
    gain: Arc<SharedGain>,
    stats: Arc<RenderStats>,
}

impl GeneratorRegistry {
    /// Build both halves of a registry for `config`.
    ///
    /// The [`Renderer`] must be moved to the audio thread; the registry stays
    /// with the caller.
    pub fn new(config: &EngineConfig) -> Result<(Self, Renderer), ConfigError> {
        config.validate()?;
        let capacity = config.max_generators;
        let (producer, consumer) = HeapRb::<Command>::new(config.command_capacity).split();
        let stats = Arc::new(RenderStats::default());
        let gain = Arc::new(SharedGain::new(config.master_gain));
        let renderer = Renderer::new(consumer, config, Arc::clone(&gain), Arc::clone(&stats));

        let registry = Self {
            producer,
            slots: vec![SlotState { generation: 1, kind: None }; capacity],
            // popped from the back, so slot 0 is handed out first
            free: (0..capacity as u32).rev().collect(),
            live: 0,
            sample_rate: config.sample_rate_f32(),
            gain,
            stats,
        };
        debug!(capacity, sample_rate = config.sample_rate, "generator registry created");
        Ok((registry, renderer))
    }

    /// Create a generator and schedule it on the audio thread.
    ///
    /// Fails with [`RegistryError::CapacityExceeded`] when the configured number
    /// of generators is already live, or [`RegistryError::InvalidParams`] when
    /// `params` are out of range. Nothing changes on failure.
    ///
    /// Blocks while the command queue is full and the renderer is alive.
    pub fn create(&mut self, params: GeneratorParams) -> Result<GeneratorHandle, RegistryError> {
        self.check_capacity()?;
        let generator = params.build(self.sample_rate)?;
        self.insert(generator)
    }

    fn check_capacity(&self) -> Result<(), RegistryError> {
        let max = self.slots.len();
        if self.live >= max {
            debug!(max, "generator create rejected: capacity exceeded");
            return Err(RegistryError::CapacityExceeded { max });
        }
        Ok(())
    }

    /// Schedule an already built generator.
    pub(crate) fn insert(&mut self, generator: Generator) -> Result<GeneratorHandle, RegistryError> {
        self.check_capacity()?;
        let max = self.slots.len();
        let kind = generator.kind();
        let slot = self.free.pop().ok_or(RegistryError::CapacityExceeded { max })?;

        let state = &mut self.slots[slot as usize];
        state.kind = Some(kind);
        let handle = GeneratorHandle { slot, generation: state.generation };
        self.live += 1;

        self.send(Command::Insert { slot, generator });
        debug!(?handle, ?kind, live = self.live, "generator created");
        Ok(handle)
    }

    /// Release the generator behind `handle`.
    ///
    /// Idempotent: unknown, stale or already released handles are a no-op and
    /// return `false`. The handle is dead as soon as this returns; the audio
    /// thread stops the generator on its next callback (after the declick fade).
    /// Like `create`, waits for queue room while the renderer is alive.
    pub fn remove(&mut self, handle: GeneratorHandle) -> bool {
        match self.release(handle) {
            Ok(kind) => {
                debug!(?handle, ?kind, live = self.live, "generator removed");
                true
            }
            Err(InvalidHandle) => {
                trace!(?handle, "remove ignored: handle is not live");
                false
            }
        }
    }

    fn release(&mut self, handle: GeneratorHandle) -> Result<GeneratorKind, InvalidHandle> {
        let state = self.slots.get_mut(handle.slot as usize).ok_or(InvalidHandle)?;
        if state.generation != handle.generation {
            return Err(InvalidHandle);
        }
        let kind = state.kind.take().ok_or(InvalidHandle)?;
        // an exhausted generation would alias old handles, so the slot is retired
        match state.generation.checked_add(1) {
            Some(g) => {
                state.generation = g;
                self.free.push(handle.slot);
            }
            None => warn!(slot = handle.slot, "slot generation exhausted, retiring slot"),
        }
        self.live -= 1;
        self.send(Command::Release { slot: handle.slot });
        Ok(kind)
    }

    /// Release every live generator.
    pub fn clear(&mut self) {
        let live: Vec<GeneratorHandle> = self.handles().collect();
        for handle in live {
            self.remove(handle);
        }
    }

    /// Change the master gain applied by the renderer (finite, in [0, 4]).
    ///
    /// Takes effect at the start of the next callback. Never blocks.
    pub fn set_master_gain(&mut self, gain: f32) -> Result<(), RegistryError> {
        if !valid_gain(gain) {
            return Err(RegistryError::Gain(gain));
        }
        self.gain.store(gain);
        debug!(gain, "master gain set");
        Ok(())
    }

    #[inline]
    pub fn master_gain(&self) -> f32 {
        self.gain.load()
    }

    /// True while `handle` refers to a live generator.
    pub fn contains(&self, handle: GeneratorHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|s| s.generation == handle.generation && s.kind.is_some())
    }

    /// Kind of the generator behind `handle`, if it is live.
    pub fn kind_of(&self, handle: GeneratorHandle) -> Option<GeneratorKind> {
        if self.contains(handle) { self.slots[handle.slot as usize].kind } else { None }
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> impl Iterator<Item = GeneratorHandle> + '_ {
        self.slots.iter().enumerate().filter(|(_, s)| s.kind.is_some()).map(|(i, s)| GeneratorHandle {
            slot: i as u32,
            generation: s.generation,
        })
    }

    /// Number of live generators of `kind`.
    pub fn active_count(&self, kind: GeneratorKind) -> usize {
        self.slots.iter().filter(|s| s.kind == Some(kind)).count()
    }

    #[inline] pub fn len(&self) -> usize { self.live }
    #[inline] pub fn is_empty(&self) -> bool { self.live == 0 }
    #[inline] pub fn capacity(&self) -> usize { self.slots.len() }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }

    /// Counters published by the audio thread.
    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    /// Commands queued but not yet applied by the audio thread.
    pub fn pending_commands(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Queue a command for the audio thread.
    ///
    /// When the queue is full this waits for the renderer to drain it, so every
    /// command is in the queue when `send` returns. A dropped renderer never
    /// drains; its commands are discarded.
    fn send(&mut self, mut cmd: Command) {
        let mut waits = 0u32;
        loop {
            match self.producer.try_push(cmd) {
                Ok(()) => return,
                Err(back) => cmd = back,
            }
            if !self.producer.read_is_held() {
                trace!("renderer dropped, command discarded");
                return;
            }
            if waits == 0 {
                debug!("command queue full, waiting for the audio thread");
            }
            waits = waits.saturating_add(1);
            if waits < 64 {
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_micros(100));
            }
        }
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("live", &self.live)
            .field("capacity", &self.slots.len())
            .field("pending", &self.pending_commands())
            .finish()
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{NoiseParams, ToneParams};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry(max: usize) -> (GeneratorRegistry, Renderer) {
        GeneratorRegistry::new(&EngineConfig::default().with_max_generators(max)).unwrap()
    }

    fn tone() -> GeneratorParams {
        GeneratorParams::Tone(ToneParams::default())
    }

    fn noise() -> GeneratorParams {
        GeneratorParams::Noise(NoiseParams { seed: Some(3), ..NoiseParams::default() })
    }

    #[test]
    fn create_returns_distinct_live_handles() {
        let (mut reg, _r) = registry(4);
        let a = reg.create(tone()).unwrap();
        let b = reg.create(noise()).unwrap();
        assert_ne!(a, b);
        assert!(reg.contains(a) && reg.contains(b));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.kind_of(a), Some(GeneratorKind::Tone));
        assert_eq!(reg.active_count(GeneratorKind::Noise), 1);
    }

    #[test]
    fn capacity_exceeded_leaves_size_unchanged() {
        let (mut reg, _r) = registry(1);
        reg.create(tone()).unwrap();
        assert_eq!(reg.create(tone()), Err(RegistryError::CapacityExceeded { max: 1 }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn invalid_params_do_not_consume_a_slot() {
        let (mut reg, _r) = registry(1);
        let bad = GeneratorParams::Tone(ToneParams { frequency: -1.0, ..ToneParams::default() });
        assert!(matches!(reg.create(bad), Err(RegistryError::InvalidParams(_))));
        assert!(reg.is_empty());
        assert!(reg.create(tone()).is_ok());
    }

    #[test]
    fn remove_is_idempotent() {
        let (mut reg, _r) = registry(2);
        let h = reg.create(tone()).unwrap();
        assert!(reg.remove(h));
        assert!(!reg.remove(h));
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_handle_never_reaches_reused_slot() {
        let (mut reg, _r) = registry(1);
        let old = reg.create(tone()).unwrap();
        reg.remove(old);
        let new = reg.create(noise()).unwrap();
        assert_eq!(old.slot(), new.slot());
        assert!(!reg.contains(old));
        assert!(!reg.remove(old));
        assert!(reg.contains(new));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn raw_handles_round_trip_and_zero_is_invalid() {
        let (mut reg, _r) = registry(2);
        let h = reg.create(tone()).unwrap();
        assert_ne!(h.to_raw(), 0);
        assert_eq!(GeneratorHandle::from_raw(h.to_raw()), Some(h));
        assert_eq!(GeneratorHandle::from_raw(0), None);
        let foreign = GeneratorHandle::from_raw((1 << 32) | 999).unwrap();
        assert!(!reg.remove(foreign));
    }

    #[test]
    fn full_queue_waits_for_the_audio_thread() {
        let cfg = EngineConfig::default().with_max_generators(1).with_command_capacity(2).with_declick_ms(0.0);
        let (mut reg, mut r) = GeneratorRegistry::new(&cfg).unwrap();
        let stats = reg.stats();
        let running = Arc::new(AtomicBool::new(true));
        let audio = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut out = vec![0.0_f32; 64];
                while running.load(Ordering::Relaxed) {
                    r.render_mono(&mut out);
                    thread::yield_now();
                }
                r
            })
        };
        for _ in 0..50 {
            let h = reg.create(tone()).unwrap();
            assert!(reg.remove(h));
            // nothing is ever parked on the control side
            assert!(reg.pending_commands() <= 2);
        }
        running.store(false, Ordering::Relaxed);
        let mut r = audio.join().unwrap();
        let mut out = vec![0.0_f32; 64];
        r.render_mono(&mut out);
        assert_eq!(reg.pending_commands(), 0);
        assert_eq!(r.active_len(), 0);
        assert!(stats.callbacks() > 0);
    }

    #[test]
    fn dropped_renderer_does_not_block_the_control_side() {
        let cfg = EngineConfig::default().with_max_generators(1).with_command_capacity(2);
        let (mut reg, r) = GeneratorRegistry::new(&cfg).unwrap();
        drop(r);
        for _ in 0..50 {
            let h = reg.create(tone()).unwrap();
            assert!(reg.remove(h));
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn exhausted_generation_retires_the_slot() {
        let (mut reg, _r) = registry(1);
        reg.slots[0].generation = u32::MAX - 1;
        let a = reg.create(tone()).unwrap();
        assert!(reg.remove(a));
        let b = reg.create(tone()).unwrap();
        assert_eq!(b.to_raw() >> 32, u64::from(u32::MAX));
        assert!(reg.remove(b));
        // the slot would wrap back to a generation old handles may still carry
        assert_eq!(reg.create(tone()), Err(RegistryError::CapacityExceeded { max: 1 }));
        assert!(!reg.contains(a) && !reg.contains(b));
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_releases_everything() {
        let (mut reg, _r) = registry(3);
        reg.create(tone()).unwrap();
        reg.create(noise()).unwrap();
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.handles().count(), 0);
    }

    #[test]
    fn master_gain_is_validated() {
        let (mut reg, _r) = registry(1);
        assert!(reg.set_master_gain(0.5).is_ok());
        assert_eq!(reg.set_master_gain(-1.0), Err(RegistryError::Gain(-1.0)));
        assert_eq!(reg.master_gain(), 0.5);
        assert_eq!(reg.pending_commands(), 0);
    }
}
