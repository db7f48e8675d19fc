//! Audio sink: the audio-thread half of the registry.
//!
//! The platform audio clock calls into a [`Renderer`] once per period. Each call:
//! 1. drains pending registry commands (bounded by the queue capacity),
//! 2. sums every active generator, sub-block by sub-block, into a mono scratch,
//! 3. applies master gain and the mix policy so samples stay in [-1, 1],
//! 4. duplicates the mono sample to every output channel,
//! 5. retires voices whose release fade has finished.
//!
//! If the wall clock passes the callback budget (`frames / sample_rate`) the
//! rest of the buffer is filled with silence and an overrun is counted. Nothing
//! in here allocates, locks or returns an error.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chirp_core::dsp::{clamp_block, scale_in_place, soft_clip_block, OUTPUT_MAX, OUTPUT_MIN};
use chirp_core::envelopes::GateRamp;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use crate::config::{EngineConfig, MixPolicy};
use crate::generators::{Generator, GeneratorKind, SignalGenerator};
use crate::registry::Command;

/// Frames mixed per sub-block; the overrun check runs between sub-blocks.
pub const MAX_BLOCK: usize = 256;

/// Counters published by the audio thread. All loads/stores are relaxed.
#[derive(Debug, Default)]
pub struct RenderStats {
    callbacks: AtomicU64,
    frames: AtomicU64,
    overruns: AtomicU64,
    faults: AtomicU64,
    active: AtomicUsize,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub callbacks: u64,
    pub frames: u64,
    pub overruns: u64,
    pub faults: u64,
    pub active: usize,
}

impl RenderStats {
    #[inline] pub fn callbacks(&self) -> u64 { self.callbacks.load(Ordering::Relaxed) }
    #[inline] pub fn frames(&self) -> u64 { self.frames.load(Ordering::Relaxed) }
    #[inline] pub fn overruns(&self) -> u64 { self.overruns.load(Ordering::Relaxed) }
    #[inline] pub fn faults(&self) -> u64 { self.faults.load(Ordering::Relaxed) }
    /// Voices the audio thread rendered in its last callback (including fading ones).
    #[inline] pub fn active(&self) -> usize { self.active.load(Ordering::Relaxed) }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            callbacks: self.callbacks(),
            frames: self.frames(),
            overruns: self.overruns(),
            faults: self.faults(),
            active: self.active(),
        }
    }
}

/// Master gain shared by both halves, stored as `f32` bits.
#[derive(Debug)]
pub(crate) struct SharedGain(AtomicU32);

impl SharedGain {
    pub(crate) fn new(gain: f32) -> Self {
        Self(AtomicU32::new(gain.to_bits()))
    }

    #[inline] pub(crate) fn load(&self) -> f32 { f32::from_bits(self.0.load(Ordering::Relaxed)) }
    #[inline] pub(crate) fn store(&self, gain: f32) { self.0.store(gain.to_bits(), Ordering::Relaxed); }
}

/// One occupied slot of the arena.
struct Voice {
    generator: Generator,
    ramp: GateRamp,
    /// Set when the generator produced a non-finite sample; cleared each callback.
    muted: bool,
}

impl Voice {
    #[inline]
    fn finished(&self) -> bool {
        self.ramp.is_idle() || (self.muted && self.ramp.is_releasing())
    }
}

/// Audio-thread half of the generator registry.
pub struct Renderer {
    consumer: HeapCons<Command>,
    slots: Box<[Option<Voice>]>,
    /// Occupied slot indices; capacity reserved up front so pushes never allocate.
    active: Vec<u32>,
    scratch: Box<[f32]>,
    sample_rate: f32,
    declick_ms: f32,
    /// Copy of `gain` taken at the start of each callback.
    master_gain: f32,
    gain: Arc<SharedGain>,
    mix_policy: MixPolicy,
    stats: Arc<RenderStats>,
}

impl Renderer {
    pub(crate) fn new(
        consumer: HeapCons<Command>,
        config: &EngineConfig,
        gain: Arc<SharedGain>,
        stats: Arc<RenderStats>,
    ) -> Self {
        let capacity = config.max_generators;
        Self {
            consumer,
            slots: (0..capacity).map(|_| None).collect(),
            active: Vec::with_capacity(capacity),
            scratch: vec![0.0; MAX_BLOCK].into_boxed_slice(),
            sample_rate: config.sample_rate_f32(),
            declick_ms: config.declick_ms,
            master_gain: gain.load(),
            gain,
            mix_policy: config.mix_policy,
            stats,
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    #[inline] pub fn master_gain(&self) -> f32 { self.master_gain }
    #[inline] pub fn mix_policy(&self) -> MixPolicy { self.mix_policy }

    /// Voices currently rendered, including ones fading out after a release.
    #[inline] pub fn active_len(&self) -> usize { self.active.len() }

    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    /// Visit every active generator. Does not allocate.
    pub fn for_each_active(&mut self, mut f: impl FnMut(GeneratorKind, &mut Generator)) {
        visit(&self.active, &mut self.slots, |voice| f(voice.generator.kind(), &mut voice.generator));
    }

    /// Render a mono block. Budget is the block's own duration.
    pub fn render_mono(&mut self, out: &mut [f32]) {
        self.render_interleaved(out, 1);
    }

    /// Render interleaved f32 frames with `channels` channels.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let deadline = self.deadline_for(out.len(), channels);
        self.render_interleaved_until(out, channels, deadline);
    }

    /// Like [`render_interleaved`](Self::render_interleaved) with an explicit deadline.
    pub fn render_interleaved_until(&mut self, out: &mut [f32], channels: usize, deadline: Instant) {
        self.process(out, channels, deadline, |s| s, 0.0);
    }

    /// Render into a device buffer of any sample format cpal supports.
    #[cfg(feature = "realtime")]
    pub fn render<T>(&mut self, out: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let deadline = self.deadline_for(out.len(), channels);
        self.process(out, channels, deadline, T::from_sample, T::EQUILIBRIUM);
    }

    fn deadline_for(&self, samples: usize, channels: usize) -> Instant {
        let frames = samples / channels.max(1);
        Instant::now() + Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    fn process<T: Copy>(
        &mut self,
        out: &mut [T],
        channels: usize,
        deadline: Instant,
        convert: impl Fn(f32) -> T,
        silence: T,
    ) {
        self.begin_callback();
        if channels == 0 {
            self.end_callback(0);
            return;
        }

        // the scratch is taken out of `self` so mixing can borrow both
        let mut scratch = std::mem::take(&mut self.scratch);
        let step = MAX_BLOCK * channels;
        let mut offset = 0;
        while offset < out.len() {
            let end = (offset + step).min(out.len());
            let chunk = &mut out[offset..end];
            let frames = chunk.len().div_ceil(channels);
            let block = &mut scratch[..frames];
            self.mix_block(block);
            for (frame, &s) in chunk.chunks_mut(channels).zip(block.iter()) {
                frame.fill(convert(s));
            }
            offset = end;

            if offset < out.len() && Instant::now() >= deadline {
                out[offset..].fill(silence);
                self.stats.overruns.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
        self.scratch = scratch;
        self.end_callback(out.len() / channels);
    }

    fn begin_callback(&mut self) {
        self.apply_commands();
        self.master_gain = self.gain.load();
        for voice in self.slots.iter_mut().flatten() {
            voice.muted = false;
        }
    }

    fn end_callback(&mut self, frames: usize) {
        self.retire_finished();
        self.stats.callbacks.fetch_add(1, Ordering::Relaxed);
        self.stats.frames.fetch_add(frames as u64, Ordering::Relaxed);
        self.stats.active.store(self.active.len(), Ordering::Relaxed);
    }

    fn apply_commands(&mut self) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                Command::Insert { slot, generator } => {
                    let Some(entry) = self.slots.get_mut(slot as usize) else { continue };
                    let mut ramp = GateRamp::new(self.declick_ms, self.sample_rate);
                    ramp.gate_on();
                    // a reused slot may still hold a voice that is fading out
                    if entry.is_none() {
                        self.active.push(slot);
                    }
                    *entry = Some(Voice { generator, ramp, muted: false });
                }
                Command::Release { slot } => {
                    if let Some(Some(voice)) = self.slots.get_mut(slot as usize) {
                        voice.ramp.gate_off();
                    }
                }
            }
        }
    }

    /// Mix all active voices into `block` (mono) and bring it into range.
    fn mix_block(&mut self, block: &mut [f32]) {
        block.fill(0.0);
        let mut faults = 0u64;
        visit(&self.active, &mut self.slots, |voice| {
            if voice.muted {
                return;
            }
            for s in block.iter_mut() {
                let level = voice.ramp.next();
                let x = voice.generator.next_sample();
                if !x.is_finite() {
                    voice.muted = true;
                    faults += 1;
                    break;
                }
                *s += x * level;
            }
        });
        if faults > 0 {
            self.stats.faults.fetch_add(faults, Ordering::Relaxed);
        }

        scale_in_place(block, self.master_gain);
        match self.mix_policy {
            MixPolicy::Clamp => clamp_block(block, OUTPUT_MIN, OUTPUT_MAX),
            MixPolicy::SoftClip => soft_clip_block(block),
        }
    }

    fn retire_finished(&mut self) {
        let mut i = 0;
        while i < self.active.len() {
            let slot = self.active[i] as usize;
            let done = self.slots[slot].as_ref().map_or(true, Voice::finished);
            if done {
                self.slots[slot] = None;
                self.active.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}

#[inline]
fn visit(active: &[u32], slots: &mut [Option<Voice>], mut f: impl FnMut(&mut Voice)) {
    for &slot in active {
        if let Some(voice) = slots[slot as usize].as_mut() {
            f(voice);
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("sample_rate", &self.sample_rate)
            .field("active", &self.active.len())
            .field("master_gain", &self.master_gain)
            .field("mix_policy", &self.mix_policy)
            .finish()
    }
}

// ------------------------------------ Tests --------------------------------------
