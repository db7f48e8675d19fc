#![cfg_attr(not(feature = "std"), no_std)]
//! chirp Core: no_std-ready DSP primitives with optional fast-math and SIMD hooks.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations (polys/rationals) for sine and tanh
//! - `simd`     : enable `wide` lanes in the block helpers
//!
//! Modules
//! - [`dsp`]       : math backend, phase wrapping, clipping, block helpers
//! - [`envelopes`] : linear gate ramp used for declicking
//! - [`filters`]   : leaky integrators and the pink-noise shaper
//!
//! Design
//! - No heap allocations; every primitive is safe to call from an audio callback
//! - Friendly to embedded / real-time targets

pub mod dsp;
pub mod envelopes;
pub mod filters;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, clamp_block, db_to_lin, fast_sin, kill_denormals, lin_to_db, sin_cycles,
        soft_clip, soft_clip_block, wrap_phase, OUTPUT_MAX, OUTPUT_MIN, TAU,
    };
    pub use crate::envelopes::GateRamp;
    pub use crate::filters::{Leaky, PinkFilter};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let mut ramp = GateRamp::new(2.0, 48000.0);
        ramp.gate_on();
        let _ = ramp.next();
        let mut pink = PinkFilter::new();
        let _ = pink.process(0.1);
    }
}
