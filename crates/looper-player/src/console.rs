//! Line-based control console
//!
//! Stands in for the hardware panel: each line sets one knob or triggers a
//! transport action. Knob values are targets; a background thread glides
//! the engine controls towards them at the configured tick rate, the same
//! way a smoothed pot reading would.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use looper_core::engine::{
    CommandSender, Control, ControlSmoother, EngineCommand, SharedControls, Telemetry,
    TelemetrySnapshot,
};
use looper_core::{Direction, PlaybackMode, CONTROL_CENTER, CONTROL_MAX, MAX_OCTAVE};

use crate::config::ControlSettings;

pub const HELP: &str = "\
Knobs (0..1):   start, len, xfade, depth, cutoff, res
Knobs (-1..1):  tune, fm
Switches:       octave 0-7, mode forward|reverse|alternate
Transport:      play, pause, reset
Other:          status, help, quit";

/// A parsed console line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Set(Control, u16),
    Octave(u8),
    Mode(PlaybackMode),
    Play,
    Pause,
    Reset,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("'{0}' needs a value")]
    MissingValue(&'static str),

    #[error("Invalid value for '{name}': {value}")]
    InvalidValue { name: &'static str, value: String },
}

fn knob(word: &str) -> Option<Control> {
    Some(match word {
        "start" => Control::LoopStart,
        "len" | "length" => Control::LoopLength,
        "xfade" => Control::CrossfadeLength,
        "tune" => Control::Tune,
        "depth" => Control::FmDepth,
        "fm" => Control::FmSignal,
        "cutoff" => Control::FilterCutoff,
        "res" | "resonance" => Control::FilterResonance,
        _ => return None,
    })
}

/// Map a console value onto the 12-bit control range
fn knob_value(control: Control, value: f32) -> Option<u16> {
    if !value.is_finite() {
        return None;
    }
    let raw = if control.is_bipolar() {
        if !(-1.0..=1.0).contains(&value) {
            return None;
        }
        CONTROL_CENTER as f32 + value * CONTROL_CENTER as f32
    } else {
        if !(0.0..=1.0).contains(&value) {
            return None;
        }
        value * CONTROL_MAX as f32
    };
    Some(raw.round().clamp(0.0, CONTROL_MAX as f32) as u16)
}

/// Parse one console line
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(ParseError::Unknown(String::new()));
    };
    let head = head.to_ascii_lowercase();
    let arg = words.next();

    if let Some(control) = knob(&head) {
        let name = control.name();
        let text = arg.ok_or(ParseError::MissingValue(name))?;
        let invalid = || ParseError::InvalidValue {
            name,
            value: text.to_string(),
        };
        let value: f32 = text.parse().map_err(|_| invalid())?;
        return knob_value(control, value)
            .map(|v| ConsoleCommand::Set(control, v))
            .ok_or_else(invalid);
    }

    match head.as_str() {
        "octave" | "oct" => {
            let text = arg.ok_or(ParseError::MissingValue("octave"))?;
            match text.parse::<u8>() {
                Ok(octave) if octave <= MAX_OCTAVE => Ok(ConsoleCommand::Octave(octave)),
                _ => Err(ParseError::InvalidValue {
                    name: "octave",
                    value: text.to_string(),
                }),
            }
        }
        "mode" => {
            let text = arg.ok_or(ParseError::MissingValue("mode"))?;
            PlaybackMode::from_name(text)
                .map(ConsoleCommand::Mode)
                .ok_or_else(|| ParseError::InvalidValue {
                    name: "mode",
                    value: text.to_string(),
                })
        }
        "play" => Ok(ConsoleCommand::Play),
        "pause" | "stop" => Ok(ConsoleCommand::Pause),
        "reset" | "retrig" => Ok(ConsoleCommand::Reset),
        "status" | "s" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
        _ => Err(ParseError::Unknown(head)),
    }
}

/// One-line telemetry summary
pub fn format_status(snap: &TelemetrySnapshot) -> String {
    let direction = match snap.direction {
        Direction::Forward => ">",
        Direction::Reverse => "<",
    };
    let diag: Vec<&str> = snap.diag.iter_names().map(|(name, _)| name).collect();
    format!(
        "{} {} {} | loop {}..{} ({:.2} + {:.2}) | head {:.2}{} | loops {} | diag [{}]",
        snap.state.name(),
        snap.mode.name(),
        direction,
        snap.active_start,
        snap.active_end,
        snap.start_q12() as f32 / CONTROL_MAX as f32,
        snap.len_q12() as f32 / CONTROL_MAX as f32,
        snap.playhead_norm() as f32 / CONTROL_MAX as f32,
        if snap.crossfade_active { " xfade" } else { "" },
        snap.loop_events,
        diag.join(" "),
    )
}

/// Knob targets plus the thread that smooths them into the engine controls
pub struct ControlDesk {
    targets: Arc<SharedControls>,
    engine: Arc<SharedControls>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ControlDesk {
    pub fn start(engine: Arc<SharedControls>, settings: &ControlSettings) -> Result<Self> {
        let targets = Arc::new(SharedControls::new());
        for control in Control::ALL {
            targets.set(control, engine.get(control));
        }
        targets.set_octave(engine.octave());

        let running = Arc::new(AtomicBool::new(true));
        let tick = Duration::from_secs_f64(1.0 / settings.tick_hz.max(1) as f64);
        let (shift, median3) = (settings.smoothing_shift, settings.median3);

        let worker = {
            let targets = Arc::clone(&targets);
            let engine = Arc::clone(&engine);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("looper-controls".to_string())
                .spawn(move || {
                    let mut smoothers: [ControlSmoother; Control::COUNT] =
                        std::array::from_fn(|_| ControlSmoother::new(shift, median3));
                    while running.load(Ordering::Relaxed) {
                        for control in Control::ALL {
                            let value = smoothers[control as usize].process(targets.get(control));
                            engine.set(control, value);
                        }
                        thread::sleep(tick);
                    }
                })
                .context("Failed to spawn control thread")?
        };

        log::debug!(
            "Control smoothing: shift {}, median3 {}, {} Hz",
            shift,
            median3,
            settings.tick_hz
        );

        Ok(Self {
            targets,
            engine,
            running,
            worker: Some(worker),
        })
    }

    pub fn set(&self, control: Control, value: u16) {
        self.targets.set(control, value);
    }

    #[cfg(test)]
    pub fn target(&self, control: Control) -> u16 {
        self.targets.get(control)
    }

    /// The octave switch is discrete and bypasses smoothing
    pub fn set_octave(&self, octave: u8) {
        self.targets.set_octave(octave);
        self.engine.set_octave(octave);
    }

    pub fn request_reset(&self) {
        self.engine.request_reset();
    }
}

impl Drop for ControlDesk {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Read commands until `quit` or end of input
pub fn run_console<R: BufRead>(
    input: R,
    desk: &ControlDesk,
    commands: &mut CommandSender,
    telemetry: &Telemetry,
) -> Result<()> {
    println!("{}", HELP);

    for line in input.lines() {
        let line = line.context("Failed to read console input")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Set(control, value) => desk.set(control, value),
            ConsoleCommand::Octave(octave) => desk.set_octave(octave),
            ConsoleCommand::Reset => desk.request_reset(),
            ConsoleCommand::Mode(mode) => send(commands, EngineCommand::SetMode(mode)),
            ConsoleCommand::Play => send(commands, EngineCommand::Play(true)),
            ConsoleCommand::Pause => send(commands, EngineCommand::Play(false)),
            ConsoleCommand::Status => println!("{}", format_status(&telemetry.read())),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }
    Ok(())
}

fn send(commands: &mut CommandSender, command: EngineCommand) {
    if let Err(rejected) = commands.send(command) {
        log::warn!("Command queue full, dropped {:?}", rejected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looper_core::engine::{command_channel, ControlSource};
    use looper_core::{DiagFlags, TransportState};

    #[test]
    fn test_parse_knobs() {
        assert_eq!(parse_command("start 0.25"), Ok(ConsoleCommand::Set(Control::LoopStart, 1024)));
        assert_eq!(parse_command("len 1"), Ok(ConsoleCommand::Set(Control::LoopLength, CONTROL_MAX)));
        assert_eq!(parse_command("XFADE 0"), Ok(ConsoleCommand::Set(Control::CrossfadeLength, 0)));
        assert_eq!(parse_command("res 0.5"), Ok(ConsoleCommand::Set(Control::FilterResonance, 2048)));
    }

    #[test]
    fn test_parse_bipolar_knobs() {
        assert_eq!(parse_command("tune 0"), Ok(ConsoleCommand::Set(Control::Tune, CONTROL_CENTER)));
        assert_eq!(parse_command("tune -1"), Ok(ConsoleCommand::Set(Control::Tune, 0)));
        assert_eq!(parse_command("fm 1"), Ok(ConsoleCommand::Set(Control::FmSignal, CONTROL_MAX)));
        assert_eq!(parse_command("fm -0.5"), Ok(ConsoleCommand::Set(Control::FmSignal, 1024)));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert_eq!(parse_command("start"), Err(ParseError::MissingValue("start")));
        assert_eq!(
            parse_command("start 1.5"),
            Err(ParseError::InvalidValue { name: "start", value: "1.5".to_string() })
        );
        assert!(parse_command("depth -0.1").is_err());
        assert!(parse_command("cutoff abc").is_err());
        assert!(parse_command("octave 8").is_err());
        assert!(parse_command("mode sideways").is_err());
        assert_eq!(parse_command("warp 9"), Err(ParseError::Unknown("warp".to_string())));
    }

    #[test]
    fn test_parse_switches_and_transport() {
        assert_eq!(parse_command("octave 5"), Ok(ConsoleCommand::Octave(5)));
        assert_eq!(parse_command("mode alt"), Ok(ConsoleCommand::Mode(PlaybackMode::Alternate)));
        assert_eq!(parse_command("  play "), Ok(ConsoleCommand::Play));
        assert_eq!(parse_command("pause"), Ok(ConsoleCommand::Pause));
        assert_eq!(parse_command("reset"), Ok(ConsoleCommand::Reset));
        assert_eq!(parse_command("q"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_status_line() {
        let snap = TelemetrySnapshot {
            active_start: 0,
            active_end: 4096,
            playhead: 4095,
            total_samples: 8192,
            state: TransportState::Playing,
            mode: PlaybackMode::Reverse,
            direction: Direction::Reverse,
            diag: DiagFlags::XFADE_CLAMPED,
            loop_events: 3,
            ..TelemetrySnapshot::default()
        };
        let line = format_status(&snap);
        assert!(line.starts_with("playing reverse <"));
        assert!(line.contains("loop 0..4096"));
        assert!(line.contains("head 1.00"));
        assert!(line.contains("loops 3"));
        assert!(line.contains("XFADE_CLAMPED"));
    }

    #[test]
    fn test_console_routes_commands() {
        let engine = Arc::new(SharedControls::new());
        let settings = ControlSettings {
            smoothing_shift: 0,
            median3: false,
            tick_hz: 2000,
        };
        let desk = ControlDesk::start(Arc::clone(&engine), &settings).unwrap();
        let (tx, mut rx) = command_channel();
        let mut sender = CommandSender::new(tx);
        let telemetry = Telemetry::new();

        let input = "start 0.5\noctave 2\nbogus\nmode reverse\npause\nreset\nquit\nplay\n";
        run_console(input.as_bytes(), &desk, &mut sender, &telemetry).unwrap();

        assert_eq!(desk.target(Control::LoopStart), 2048);
        assert_eq!(engine.octave(), 2);
        assert!(engine.reset_requested());
        assert!(matches!(rx.pop(), Ok(EngineCommand::SetMode(PlaybackMode::Reverse))));
        assert!(matches!(rx.pop(), Ok(EngineCommand::Play(false))));
        // Nothing after quit is read
        assert!(rx.pop().is_err());

        // Shift 0 passes targets straight through on the next tick
        for _ in 0..200 {
            if engine.get(Control::LoopStart) == 2048 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(engine.get(Control::LoopStart), 2048);
    }
}
