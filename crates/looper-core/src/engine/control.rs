//! Control inputs
//!
//! The control context (UI loop, MIDI, CV reader) writes smoothed values
//! into [`SharedControls`]; the audio context reads one [`ControlSnapshot`]
//! at the top of each block. Every field is a single atomic with one writer,
//! so no locking is involved.
//!
//! The reset request is the one bidirectional field: the control side sets
//! it, and only the engine clears it once it has acted on it.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use crate::types::{CONTROL_CENTER, CONTROL_MAX, MAX_OCTAVE, UNITY_OCTAVE};

/// Continuous controls, each in `0..=CONTROL_MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Control {
    LoopStart = 0,
    LoopLength = 1,
    CrossfadeLength = 2,
    Tune = 3,
    FmDepth = 4,
    FmSignal = 5,
    FilterCutoff = 6,
    FilterResonance = 7,
}

impl Control {
    pub const COUNT: usize = 8;

    pub const ALL: [Control; Control::COUNT] = [
        Control::LoopStart,
        Control::LoopLength,
        Control::CrossfadeLength,
        Control::Tune,
        Control::FmDepth,
        Control::FmSignal,
        Control::FilterCutoff,
        Control::FilterResonance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Control::LoopStart => "start",
            Control::LoopLength => "length",
            Control::CrossfadeLength => "xfade",
            Control::Tune => "tune",
            Control::FmDepth => "depth",
            Control::FmSignal => "fm",
            Control::FilterCutoff => "cutoff",
            Control::FilterResonance => "resonance",
        }
    }

    /// Value a freshly started engine uses
    pub fn default_value(&self) -> u16 {
        match self {
            Control::LoopLength => CONTROL_MAX,
            Control::Tune | Control::FmSignal => CONTROL_CENTER,
            _ => 0,
        }
    }

    /// Bipolar controls are centred at [`CONTROL_CENTER`]
    pub fn is_bipolar(&self) -> bool {
        matches!(self, Control::Tune | Control::FmSignal)
    }
}

/// One block's worth of control readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub loop_start: u16,
    pub loop_length: u16,
    pub xfade_length: u16,
    pub tune: u16,
    pub fm_depth: u16,
    pub fm_signal: u16,
    pub filter_cutoff: u16,
    pub filter_resonance: u16,
    /// Octave switch, 0 (LFO mode) ..= 7
    pub octave: u8,
}

impl Default for ControlSnapshot {
    fn default() -> Self {
        Self {
            loop_start: Control::LoopStart.default_value(),
            loop_length: Control::LoopLength.default_value(),
            xfade_length: Control::CrossfadeLength.default_value(),
            tune: Control::Tune.default_value(),
            fm_depth: Control::FmDepth.default_value(),
            fm_signal: Control::FmSignal.default_value(),
            filter_cutoff: Control::FilterCutoff.default_value(),
            filter_resonance: Control::FilterResonance.default_value(),
            octave: UNITY_OCTAVE,
        }
    }
}

impl ControlSnapshot {
    pub fn get(&self, control: Control) -> u16 {
        match control {
            Control::LoopStart => self.loop_start,
            Control::LoopLength => self.loop_length,
            Control::CrossfadeLength => self.xfade_length,
            Control::Tune => self.tune,
            Control::FmDepth => self.fm_depth,
            Control::FmSignal => self.fm_signal,
            Control::FilterCutoff => self.filter_cutoff,
            Control::FilterResonance => self.filter_resonance,
        }
    }
}

/// Where the engine reads its controls from
pub trait ControlSource {
    /// Current control values
    fn snapshot(&self) -> ControlSnapshot;

    /// Whether a reset (retrigger from the loop start) is pending
    fn reset_requested(&self) -> bool;

    /// Clear the reset request. Only the engine calls this.
    fn acknowledge_reset(&self);
}

/// Lock-free control block shared between the control and audio contexts
pub struct SharedControls {
    values: [AtomicU16; Control::COUNT],
    octave: AtomicU8,
    reset: AtomicBool,
}

impl SharedControls {
    pub fn new() -> Self {
        Self {
            values: Control::ALL.map(|c| AtomicU16::new(c.default_value())),
            octave: AtomicU8::new(UNITY_OCTAVE),
            reset: AtomicBool::new(false),
        }
    }

    /// Store a control value, clamped to the control range
    #[inline]
    pub fn set(&self, control: Control, value: u16) {
        self.values[control as usize].store(value.min(CONTROL_MAX), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, control: Control) -> u16 {
        self.values[control as usize].load(Ordering::Relaxed)
    }

    pub fn set_octave(&self, octave: u8) {
        self.octave.store(octave.min(MAX_OCTAVE), Ordering::Relaxed);
    }

    pub fn octave(&self) -> u8 {
        self.octave.load(Ordering::Relaxed)
    }

    /// Ask the engine to retrigger (control side of the handshake)
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Release);
    }

    /// Store every field of a snapshot
    pub fn store(&self, snapshot: &ControlSnapshot) {
        for control in Control::ALL {
            self.set(control, snapshot.get(control));
        }
        self.set_octave(snapshot.octave);
    }
}

impl Default for SharedControls {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSource for SharedControls {
    fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            loop_start: self.get(Control::LoopStart),
            loop_length: self.get(Control::LoopLength),
            xfade_length: self.get(Control::CrossfadeLength),
            tune: self.get(Control::Tune),
            fm_depth: self.get(Control::FmDepth),
            fm_signal: self.get(Control::FmSignal),
            filter_cutoff: self.get(Control::FilterCutoff),
            filter_resonance: self.get(Control::FilterResonance),
            octave: self.octave(),
        }
    }

    fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::Acquire)
    }

    fn acknowledge_reset(&self) {
        self.reset.store(false, Ordering::Release);
    }
}

/// Integer EMA smoother for raw control readings
///
/// `y += (x - y) >> shift`, optionally preceded by a median-of-3 filter that
/// removes single-sample spikes. Runs on the control side, not in the audio
/// callback.
#[derive(Debug, Clone)]
pub struct ControlSmoother {
    shift: u8,
    median3: bool,
    value: i32,
    history: [u16; 2],
    primed: bool,
}

/// Largest useful smoothing shift
pub const MAX_SMOOTHING_SHIFT: u8 = 15;

impl ControlSmoother {
    pub fn new(shift: u8, median3: bool) -> Self {
        Self {
            shift: shift.min(MAX_SMOOTHING_SHIFT),
            median3,
            value: 0,
            history: [0; 2],
            primed: false,
        }
    }

    /// Feed one raw reading and return the smoothed value
    pub fn process(&mut self, raw: u16) -> u16 {
        let input = if self.median3 {
            let [older, newer] = self.history;
            self.history = [newer, raw];
            if self.primed {
                median_of_three(raw, newer, older)
            } else {
                self.history = [raw, raw];
                raw
            }
        } else {
            raw
        };

        if !self.primed {
            self.value = input as i32;
            self.primed = true;
            return input;
        }

        self.value += (input as i32 - self.value) >> self.shift;
        self.value as u16
    }

    pub fn value(&self) -> u16 {
        self.value as u16
    }

    pub fn shift(&self) -> u8 {
        self.shift
    }

    pub fn set_shift(&mut self, shift: u8) {
        self.shift = shift.min(MAX_SMOOTHING_SHIFT);
    }

    pub fn set_median3(&mut self, enabled: bool) {
        self.median3 = enabled;
    }

    /// Pick the shift whose EMA cutoff is closest to `cutoff_hz` when
    /// updated at `tick_rate_hz`
    pub fn set_cutoff_hz(&mut self, tick_rate_hz: f32, cutoff_hz: f32) {
        if !(cutoff_hz > 0.0 && tick_rate_hz > 0.0) {
            return;
        }
        let alpha = (1.0 - (-2.0 * std::f32::consts::PI * cutoff_hz / tick_rate_hz).exp()).max(1e-6);
        let shift = (1.0 / alpha).log2().round().clamp(0.0, MAX_SMOOTHING_SHIFT as f32);
        self.shift = shift as u8;
    }

    /// Like [`set_cutoff_hz`](Self::set_cutoff_hz) with a time constant
    pub fn set_tau_ms(&mut self, tick_rate_hz: f32, tau_ms: f32) {
        if !(tau_ms > 0.0) {
            return;
        }
        let cutoff = 1.0 / (2.0 * std::f32::consts::PI * (tau_ms / 1000.0));
        self.set_cutoff_hz(tick_rate_hz, cutoff);
    }
}

fn median_of_three(a: u16, b: u16, c: u16) -> u16 {
    a.max(b).min(a.min(b).max(c))
}
