//! C ABI wrapper for the chirp engine.
//!
//! A host that owns its own audio callback creates the engine once and gets
//! back two opaque objects:
//! - `ChirpControl`: start/stop calls, used from the UI/control thread.
//! - `ChirpRenderer`: `chirp_render_interleaved_f32`, used only from the audio thread.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Null object pointers are ignored (start calls return 0, render returns 0).
//! - Generator handles cross the boundary as non-zero `u64`; 0 means "no generator".
//! - The two objects may live on different threads but each one must only be
//!   used from one thread at a time.

use chirp_engine::{engine, ControlSurface, EngineConfig, GeneratorHandle, Renderer, VoiceConfig};

pub const CHIRP_OK: i32 = 0;
pub const CHIRP_ERR_NULL: i32 = -1;
pub const CHIRP_ERR_CONFIG: i32 = -2;
pub const CHIRP_ERR_GAIN: i32 = -3;

/// Control-thread half handed to C.
pub struct ChirpControl {
    inner: ControlSurface,
}

/// Audio-thread half handed to C.
pub struct ChirpRenderer {
    inner: Renderer,
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine running at `sample_rate` with room for `max_generators`
/// concurrent generators (0 selects the default).
///
/// On success writes both objects and returns `CHIRP_OK`; the caller owns them
/// and frees them with `chirp_control_destroy` / `chirp_renderer_destroy`.
#[no_mangle]
pub extern "C" fn chirp_create(
    sample_rate: u32,
    max_generators: u32,
    out_control: *mut *mut ChirpControl,
    out_renderer: *mut *mut ChirpRenderer,
) -> i32 {
    if out_control.is_null() || out_renderer.is_null() {
        return CHIRP_ERR_NULL;
    }
    let mut config = EngineConfig::default().with_sample_rate(sample_rate);
    if max_generators > 0 {
        config = config.with_max_generators(max_generators as usize);
    }
    let Ok((control, renderer)) = engine(&config, VoiceConfig::default()) else {
        return CHIRP_ERR_CONFIG;
    };
    unsafe {
        *out_control = Box::into_raw(Box::new(ChirpControl { inner: control }));
        *out_renderer = Box::into_raw(Box::new(ChirpRenderer { inner: renderer }));
    }
    CHIRP_OK
}

/// Destroy a control object. Generators it left playing keep playing until
/// the renderer is destroyed.
#[no_mangle]
pub extern "C" fn chirp_control_destroy(control: *mut ChirpControl) {
    if !control.is_null() {
        unsafe { drop(Box::from_raw(control)); }
    }
}

#[no_mangle]
pub extern "C" fn chirp_renderer_destroy(renderer: *mut ChirpRenderer) {
    if !renderer.is_null() {
        unsafe { drop(Box::from_raw(renderer)); }
    }
}

fn control_mut<'a>(control: *mut ChirpControl) -> Option<&'a mut ControlSurface> {
    unsafe { control.as_mut() }.map(|c| &mut c.inner)
}

// --- Control ---------------------------------------------------------------------

/// Start the beep tone (no-op if already playing). Returns its handle, 0 on failure.
#[no_mangle]
pub extern "C" fn chirp_start_beep(control: *mut ChirpControl) -> u64 {
    control_mut(control)
        .and_then(|c| c.start_beep().ok())
        .map_or(0, GeneratorHandle::to_raw)
}

#[no_mangle]
pub extern "C" fn chirp_stop_beep(control: *mut ChirpControl) {
    if let Some(c) = control_mut(control) {
        c.stop_beep();
    }
}

/// Start white noise (no-op if already playing). Returns its handle, 0 on failure.
#[no_mangle]
pub extern "C" fn chirp_start_white_noise(control: *mut ChirpControl) -> u64 {
    control_mut(control)
        .and_then(|c| c.start_white_noise().ok())
        .map_or(0, GeneratorHandle::to_raw)
}

#[no_mangle]
pub extern "C" fn chirp_stop_white_noise(control: *mut ChirpControl) {
    if let Some(c) = control_mut(control) {
        c.stop_white_noise();
    }
}

/// Release a generator by raw handle. Returns 1 if it was live, 0 otherwise.
/// Releasing the current beep or noise handle counts as stopping it.
#[no_mangle]
pub extern "C" fn chirp_release(control: *mut ChirpControl, handle: u64) -> i32 {
    let Some(c) = control_mut(control) else { return 0 };
    let Some(h) = GeneratorHandle::from_raw(handle) else { return 0 };
    i32::from(c.release(h))
}

/// Set master gain, finite and within [0, 4].
#[no_mangle]
pub extern "C" fn chirp_set_gain(control: *mut ChirpControl, gain: f32) -> i32 {
    let Some(c) = control_mut(control) else { return CHIRP_ERR_NULL };
    match c.registry_mut().set_master_gain(gain) {
        Ok(()) => CHIRP_OK,
        Err(_) => CHIRP_ERR_GAIN,
    }
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The mix is mono; each sample is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn chirp_render_interleaved_f32(
    renderer: *mut ChirpRenderer,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if renderer.is_null() || out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let r = unsafe { &mut *renderer };
    let ch = channels as usize;
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, frames as usize * ch) };
    r.inner.render_interleaved(out, ch);
    frames
}

// ------------------------------------ Tests --------------------------------------
