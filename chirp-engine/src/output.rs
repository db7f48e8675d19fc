//! Audio output through cpal.
//!
//! Opens an output device, negotiates the stream config closest to the one the
//! engine asks for, and moves the [`Renderer`] into the device callback. The
//! caller gets back the [`ControlSurface`] for the other half.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{EngineConfig, VoiceConfig};
use crate::control::ControlSurface;
use crate::error::ConfigError;
use crate::registry::GeneratorRegistry;
use crate::render::Renderer;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no default output device")]
    NoDevice,
    #[error("requested device not found: {0}")]
    DeviceNotFound(String),
    #[error("device offers no output configs")]
    NoConfig,
    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),
    #[error(transparent)]
    DeviceName(#[from] cpal::DeviceNameError),
    #[error(transparent)]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error(transparent)]
    PauseStream(#[from] cpal::PauseStreamError),
    #[error("engine config: {0}")]
    Config(#[from] ConfigError),
}

/// Names of the host's output devices.
pub fn list_output_devices() -> Result<Vec<String>, OutputError> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for dev in host.output_devices()? {
        names.push(dev.name()?);
    }
    Ok(names)
}

fn pick_device(name: Option<&str>) -> Result<cpal::Device, OutputError> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        return Err(OutputError::DeviceNotFound(name.to_string()));
    }
    host.default_output_device().ok_or(OutputError::NoDevice)
}

/// Pick the supported config closest to the requested rate and channel count.
fn choose_config(device: &cpal::Device, req_sr: u32, req_ch: u16) -> Result<cpal::SupportedStreamConfig, OutputError> {
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = u64::from(ch.abs_diff(req_ch));
        let sr_pen = if (sr_min..=sr_max).contains(&req_sr) {
            0
        } else {
            u64::from(sr_min.abs_diff(req_sr).min(sr_max.abs_diff(req_sr)))
        };
        // f32 is cheapest to feed, so prefer it on ties
        let fmt_pen = u64::from(range.sample_format() != cpal::SampleFormat::F32);

        let score = sr_pen.saturating_mul(1000) + ch_pen * 2 + fmt_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or(OutputError::NoConfig)?;
    let sr = req_sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    Ok(range.with_sample_rate(cpal::SampleRate(sr)))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = usize::from(cfg.channels);
    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(output, channels),
        |e: cpal::StreamError| error!("audio stream error: {e}"),
        None,
    )?;
    Ok(stream)
}

/// A running output stream. Dropping it stops playback.
pub struct AudioOutput {
    stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open `device_name` (or the default device), start the stream and return
    /// it together with the control surface that drives it.
    ///
    /// The engine runs at the rate the device actually accepts; a mismatch with
    /// `config.sample_rate` is logged.
    pub fn open(
        config: &EngineConfig,
        voices: VoiceConfig,
        device_name: Option<&str>,
    ) -> Result<(Self, ControlSurface), OutputError> {
        config.validate()?;
        let device = pick_device(device_name)?;
        let name = device.name()?;
        let supported = choose_config(&device, config.sample_rate, config.channels)?;
        let sample_format = supported.sample_format();
        let stream_cfg: cpal::StreamConfig = supported.config();

        if stream_cfg.sample_rate.0 != config.sample_rate {
            warn!(requested = config.sample_rate, actual = stream_cfg.sample_rate.0, "device does not offer the requested sample rate");
        }
        if stream_cfg.channels != config.channels {
            warn!(requested = config.channels, actual = stream_cfg.channels, "mono mix is duplicated to the device channel count");
        }

        let engine_cfg = config
            .with_sample_rate(stream_cfg.sample_rate.0)
            .with_channels(stream_cfg.channels);
        let (registry, renderer) = GeneratorRegistry::new(&engine_cfg)?;

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_cfg, renderer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_cfg, renderer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_cfg, renderer)?,
            other => return Err(OutputError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        info!(device = %name, sample_rate = stream_cfg.sample_rate.0, channels = stream_cfg.channels, ?sample_format, "audio stream started");

        let output = Self {
            stream,
            device_name: name,
            sample_rate: stream_cfg.sample_rate.0,
            channels: stream_cfg.channels,
        };
        Ok((output, ControlSurface::new(registry, voices)))
    }

    /// Pause the device stream (generators keep their state).
    pub fn pause(&self) -> Result<(), OutputError> {
        Ok(self.stream.pause()?)
    }

    pub fn resume(&self) -> Result<(), OutputError> {
        Ok(self.stream.play()?)
    }

    #[inline] pub fn device_name(&self) -> &str { &self.device_name }
    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }
    #[inline] pub fn channels(&self) -> u16 { self.channels }
}
