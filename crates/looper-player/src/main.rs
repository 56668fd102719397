//! Looper Player - desktop host for the looper engine
//!
//! - `play <wav>`: loop a WAV file on an audio device, driven from the console
//! - `render <wav> <out>`: render offline to a WAV file
//! - `devices`: list audio output devices
//!
//! Set RUST_LOG=debug for engine transport logging.

mod audio;
mod config;
mod console;
mod loader;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use looper_core::config::load_config;
use looper_core::engine::{EngineCommand, SharedControls};
use looper_core::PlaybackMode;

use config::PlayerConfig;
use console::{ConsoleCommand, ControlDesk};

#[derive(Parser)]
#[command(name = "looper-player", version, about = "Loop playback engine host")]
struct Cli {
    /// Config file (defaults to the looper config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loop a WAV file on an audio output device
    Play {
        wav: PathBuf,

        /// Output device name (see `devices`)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// List audio output devices
    Devices,

    /// Render a WAV file through the engine offline
    Render {
        wav: PathBuf,
        out: PathBuf,

        /// Length of the render in seconds
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,

        /// Console command applied before rendering, e.g. "len 0.5" (repeatable)
        #[arg(long = "set", value_name = "COMMAND")]
        settings: Vec<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("looper-player {} starting up", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config: PlayerConfig = load_config(&config_path);

    match cli.command {
        Commands::Play { wav, device } => play(config, &wav, device),
        Commands::Devices => list_devices(),
        Commands::Render {
            wav,
            out,
            seconds,
            settings,
        } => render_offline(config, &wav, &out, seconds, &settings),
    }
}

fn play(mut config: PlayerConfig, wav: &Path, device: Option<String>) -> Result<()> {
    let buffer = loader::load_wav(wav).with_context(|| format!("Failed to load {:?}", wav))?;
    let duration = buffer.duration_secs();
    if device.is_some() {
        config.audio.device = device;
    }

    let controls = Arc::new(SharedControls::new());
    let output = audio::start_output(&config.audio, &config.engine, Arc::clone(&controls))
        .context("Failed to start audio output")?;
    let mut commands = output.commands;

    for command in [
        EngineCommand::Bind(buffer),
        EngineCommand::Arm(true),
        EngineCommand::Play(true),
    ] {
        commands
            .send(command)
            .map_err(|rejected| anyhow!("Command queue full: {:?}", rejected))?;
    }

    let desk = ControlDesk::start(controls, &config.controls)?;
    println!(
        "Playing {:?} ({:.2} s) at {} Hz ({} ch)",
        wav,
        duration,
        output.handle.sample_rate(),
        output.handle.channels()
    );

    let stdin = std::io::stdin();
    console::run_console(stdin.lock(), &desk, &mut commands, &output.telemetry)?;

    log::info!("Shutting down");
    drop(desk);
    drop(output.handle);
    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = audio::list_output_devices()?;
    for device in devices {
        println!(
            "{}{} [{}] ({} ch)",
            if device.is_default { "* " } else { "  " },
            device.name,
            device.host,
            device.max_channels
        );
    }
    Ok(())
}

fn render_offline(
    config: PlayerConfig,
    wav: &Path,
    out: &Path,
    seconds: f64,
    settings: &[String],
) -> Result<()> {
    let buffer = loader::load_wav(wav).with_context(|| format!("Failed to load {:?}", wav))?;

    let controls = SharedControls::new();
    let mut mode = PlaybackMode::Forward;
    for setting in settings {
        match console::parse_command(setting)? {
            ConsoleCommand::Set(control, value) => controls.set(control, value),
            ConsoleCommand::Octave(octave) => controls.set_octave(octave),
            ConsoleCommand::Mode(m) => mode = m,
            other => bail!("'{}' ({:?}) has no meaning for an offline render", setting, other),
        }
    }

    let summary = render::render_to_wav(buffer, &config.engine, &controls, mode, seconds, out)?;
    println!(
        "Wrote {} frames to {:?} ({} loop events)",
        summary.frames, out, summary.loop_events
    );
    Ok(())
}
