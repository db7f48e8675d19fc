//! chirp CLI: interactive player for a beep tone and white noise.
//!
//! Opens an output device, then reads one command per line from stdin:
//!
//! ```text
//! beep | stop-beep | noise | stop-noise | gain <x> | stats | stop | quit
//! ```
//!
//! `gain` takes a linear factor (`gain 0.5`) or decibels (`gain -6db`).

use std::io::BufRead;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chirp_core::dsp::{db_to_lin, lin_to_db};
use chirp_engine::{
    list_output_devices, AudioOutput, ControlSurface, EngineConfig, MixPolicy, NoiseColor, NoiseParams,
    StatsSnapshot, ToneParams, VoiceConfig, Wave,
};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

const POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "chirp", version, about = "Play a beep tone and white noise on the default output device")]
struct Args {
    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Output device name (default device if omitted)
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 1)]
    channels: u16,

    /// Quit after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Beep frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    beep_freq: f32,

    #[arg(long, value_enum, default_value_t = WaveArg::Sine)]
    beep_wave: WaveArg,

    /// Beep amplitude in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    beep_amp: f32,

    /// Noise amplitude in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    noise_amp: f32,

    #[arg(long, value_enum, default_value_t = ColorArg::White)]
    noise_color: ColorArg,

    /// Master gain applied to the mix
    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    #[arg(long, default_value_t = 8)]
    max_generators: usize,

    /// Fade time on start/stop in milliseconds (0 = hard cut)
    #[arg(long, default_value_t = 2.0)]
    declick_ms: f32,

    /// Saturate the mix with tanh instead of clamping
    #[arg(long)]
    soft_clip: bool,

    /// Signals to start immediately, e.g. `--start beep,noise`
    #[arg(long, value_enum, value_delimiter = ',')]
    start: Vec<Signal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WaveArg {
    Sine,
    Tri,
    Saw,
}

impl From<WaveArg> for Wave {
    fn from(w: WaveArg) -> Self {
        match w {
            WaveArg::Sine => Wave::Sine,
            WaveArg::Tri => Wave::Tri,
            WaveArg::Saw => Wave::Saw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorArg {
    White,
    Pink,
}

impl From<ColorArg> for NoiseColor {
    fn from(c: ColorArg) -> Self {
        match c {
            ColorArg::White => NoiseColor::White,
            ColorArg::Pink => NoiseColor::Pink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Signal {
    Beep,
    Noise,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let policy = if self.soft_clip { MixPolicy::SoftClip } else { MixPolicy::Clamp };
        EngineConfig::default()
            .with_sample_rate(self.sample_rate)
            .with_channels(self.channels)
            .with_max_generators(self.max_generators)
            .with_master_gain(self.gain)
            .with_declick_ms(self.declick_ms)
            .with_mix_policy(policy)
    }

    fn voices(&self) -> VoiceConfig {
        VoiceConfig {
            beep: ToneParams { frequency: self.beep_freq, amplitude: self.beep_amp, wave: self.beep_wave.into() },
            noise: NoiseParams { amplitude: self.noise_amp, color: self.noise_color.into(), seed: None },
        }
    }
}

/// One line typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Beep,
    StopBeep,
    Noise,
    StopNoise,
    Gain(f32),
    Stats,
    StopAll,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else { return Ok(None) };
    let cmd = match head.to_ascii_lowercase().as_str() {
        "beep" => Command::Beep,
        "stop-beep" => Command::StopBeep,
        "noise" => Command::Noise,
        "stop-noise" => Command::StopNoise,
        "gain" => {
            let arg = words.next().context("usage: gain <x> | gain <x>db")?;
            Command::Gain(parse_gain(arg)?)
        }
        "stats" => Command::Stats,
        "stop" => Command::StopAll,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command: {other}"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument: {extra}");
    }
    Ok(Some(cmd))
}

fn parse_gain(arg: &str) -> Result<f32> {
    let lower = arg.to_ascii_lowercase();
    match lower.strip_suffix("db") {
        Some(db) => {
            let db: f32 = db.trim().parse().with_context(|| format!("not a dB value: {arg}"))?;
            Ok(db_to_lin(db))
        }
        None => arg.parse().with_context(|| format!("not a number: {arg}")),
    }
}

/// Apply one command; returns `false` when the player should exit.
fn apply(control: &mut ControlSurface, cmd: Command) -> bool {
    match cmd {
        Command::Beep => {
            if let Err(e) = control.start_beep() {
                warn!("beep failed: {e}");
            }
        }
        Command::StopBeep => control.stop_beep(),
        Command::Noise => {
            if let Err(e) = control.start_white_noise() {
                warn!("noise failed: {e}");
            }
        }
        Command::StopNoise => control.stop_white_noise(),
        Command::Gain(g) => match control.registry_mut().set_master_gain(g) {
            Ok(()) => info!(gain = g, db = lin_to_db(g), "master gain set"),
            Err(e) => warn!("{e}"),
        },
        Command::Stats => {
            let s = control.registry().stats().snapshot();
            info!(
                callbacks = s.callbacks,
                frames = s.frames,
                overruns = s.overruns,
                faults = s.faults,
                active = s.active,
                live = control.registry().len(),
                "stats"
            );
        }
        Command::StopAll => control.stop_all(),
        Command::Quit => return false,
    }
    true
}

/// Log overruns and faults that appeared since `last`.
fn report_new_problems(last: &mut StatsSnapshot, now: StatsSnapshot) {
    if now.overruns > last.overruns {
        warn!(new = now.overruns - last.overruns, total = now.overruns, "render overruns");
    }
    if now.faults > last.faults {
        warn!(new = now.faults - last.faults, total = now.faults, "generator faults (non-finite samples muted)");
    }
    *last = now;
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        println!("Available output devices:");
        for name in list_output_devices()? {
            println!("- {name}");
        }
        return Ok(());
    }

    let config = args.engine_config();
    config.validate().context("invalid engine options")?;
    let (output, mut control) = AudioOutput::open(&config, args.voices(), args.device.as_deref())?;

    println!("chirp: {} @ {} Hz, {} ch", output.device_name(), output.sample_rate(), output.channels());
    println!("commands: beep | stop-beep | noise | stop-noise | gain <x> | stats | stop | quit");

    for signal in &args.start {
        match signal {
            Signal::Beep => apply(&mut control, Command::Beep),
            Signal::Noise => apply(&mut control, Command::Noise),
        };
    }

    let stats = control.registry().stats();
    let mut last = stats.snapshot();
    let stop_at = args.duration.map(|d| Instant::now() + Duration::from_secs(d));
    let lines = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        if stop_at.is_some_and(|t| Instant::now() >= t) {
            info!("duration elapsed");
            break;
        }
        if stdin_open {
            match lines.recv_timeout(POLL) {
                Ok(line) => match parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if !apply(&mut control, cmd) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e:#}"),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // without a duration there is nothing left to wait for
                    if stop_at.is_none() {
                        break;
                    }
                    stdin_open = false;
                }
            }
        } else {
            thread::sleep(POLL);
        }
        report_new_problems(&mut last, stats.snapshot());
    }

    control.stop_all();
    // let the release ramps play out before the stream is dropped
    thread::sleep(Duration::from_secs_f32(config.declick_ms / 1000.0) + Duration::from_millis(50));
    drop(output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_command_set() {
        assert_eq!(parse_command("beep").unwrap(), Some(Command::Beep));
        assert_eq!(parse_command("  STOP-BEEP ").unwrap(), Some(Command::StopBeep));
        assert_eq!(parse_command("noise").unwrap(), Some(Command::Noise));
        assert_eq!(parse_command("stop-noise").unwrap(), Some(Command::StopNoise));
        assert_eq!(parse_command("gain 0.25").unwrap(), Some(Command::Gain(0.25)));
        assert_eq!(parse_command("stop").unwrap(), Some(Command::StopAll));
        assert_eq!(parse_command("q").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_command("gain").is_err());
        assert!(parse_command("gain loud").is_err());
        assert!(parse_command("gain xdb").is_err());
        assert!(parse_command("beep now").is_err());
        assert!(parse_command("whistle").is_err());
    }

    #[test]
    fn gain_accepts_decibels() {
        let Some(Command::Gain(g)) = parse_command("gain -6dB").unwrap() else { panic!("not a gain command") };
        assert!((g - 0.501).abs() < 1e-3, "g={g}");
        let Some(Command::Gain(g)) = parse_command("gain 0db").unwrap() else { panic!("not a gain command") };
        assert!((g - 1.0).abs() < 1e-5);
    }

    #[test]
    fn flags_map_onto_engine_config() {
        let args = Args::parse_from([
            "chirp", "--sample-rate", "48000", "--soft-clip", "--beep-wave", "saw",
            "--noise-color", "pink", "--start", "beep,noise",
        ]);
        let cfg = args.engine_config();
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.mix_policy, MixPolicy::SoftClip);
        assert!(cfg.validate().is_ok());
        let v = args.voices();
        assert_eq!(v.beep.wave, Wave::Saw);
        assert_eq!(v.noise.color, NoiseColor::Pink);
        assert_eq!(args.start, vec![Signal::Beep, Signal::Noise]);
    }

    #[test]
    fn commands_drive_the_control_surface() {
        let (mut control, _renderer) = chirp_engine::engine(&EngineConfig::default(), VoiceConfig::default()).unwrap();
        assert!(apply(&mut control, Command::Beep));
        assert!(apply(&mut control, Command::Noise));
        assert!(control.is_beeping() && control.is_noising());
        assert!(apply(&mut control, Command::StopAll));
        assert!(control.registry().is_empty());
        assert!(!apply(&mut control, Command::Quit));
    }
}
