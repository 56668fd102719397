//! Playback rate: octave, tune and through-zero FM
//!
//! The base ratio comes from the octave switch and tune control. Octave 0 is
//! LFO mode, a very slow crawl through the loop. FM scales the base ratio by
//! `1 + depth * m`. With depth above 1 the product crosses zero and travel
//! reverses, which is what makes the FM through-zero.
//!
//! The result is relative to the source rate. Multiplying by
//! `source_rate / output_rate` turns it into the Q32.32 phase step.

use crate::config::EngineConfig;
use crate::fixed::ratio_to_phase;
use crate::types::{Direction, CONTROL_CENTER, CONTROL_MAX, MAX_OCTAVE, UNITY_OCTAVE};

use super::control::ControlSnapshot;

/// Slowest LFO-mode ratio (tune fully up)
pub const LFO_MIN_RATIO: f64 = 0.001;
/// Span of the LFO-mode ratio over the tune range
pub const LFO_SPAN: f64 = 0.999;
/// Tune range in octaves either side of the switch setting
pub const TUNE_RANGE_OCTAVES: f64 = 0.5;
/// Largest FM depth multiplier
pub const MAX_FM_DEPTH: f32 = 2.0;

/// Bipolar control (0..=4095) as -1.0..=1.0 around the centre
#[inline]
pub fn normalize_bipolar(control: u16) -> f32 {
    ((control as f32 - CONTROL_CENTER as f32) / CONTROL_CENTER as f32).clamp(-1.0, 1.0)
}

/// FM depth multiplier (0.0..=2.0)
#[inline]
pub fn fm_depth(control: u16) -> f32 {
    control.min(CONTROL_MAX) as f32 / CONTROL_MAX as f32 * MAX_FM_DEPTH
}

/// LFO-mode ratio for a normalized tune; tune fully down is the fastest
pub fn lfo_ratio(tune: f32) -> f64 {
    let t = tune.clamp(-1.0, 1.0) as f64;
    LFO_MIN_RATIO + (1.0 - t) * 0.5 * LFO_SPAN
}

/// Ratio for octave 1..=7 with ±half an octave of tune
pub fn octave_ratio(octave: u8, tune: f32) -> f64 {
    let octave = octave.clamp(1, MAX_OCTAVE) as i32 - UNITY_OCTAVE as i32;
    let tune = tune.clamp(-1.0, 1.0) as f64 * TUNE_RANGE_OCTAVES;
    (octave as f64 + tune).exp2()
}

pub fn base_ratio(octave: u8, tune: f32) -> f64 {
    if octave == 0 {
        lfo_ratio(tune)
    } else {
        octave_ratio(octave, tune)
    }
}

/// Apply FM: `ratio * (1 + depth * modulator)`
#[inline]
pub fn apply_fm(ratio: f64, depth: f32, modulator: f32) -> f64 {
    ratio * (1.0 + depth as f64 * modulator as f64)
}

/// Per-sample phase increment generator
#[derive(Debug, Clone)]
pub struct RateCalculator {
    /// source_rate / output_rate
    unity: f64,
    max_rate: f64,
    smoothing: f32,
    base: f64,
    depth: f32,
    fm_target: f32,
    fm_state: f32,
}

impl RateCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            unity: 1.0,
            max_rate: config.max_rate,
            smoothing: config.fm_smoothing.clamp(f32::MIN_POSITIVE, 1.0),
            base: 1.0,
            depth: 0.0,
            fm_target: 0.0,
            fm_state: 0.0,
        }
    }

    /// Set the resampling factor for a newly bound buffer
    pub fn set_rates(&mut self, source_rate: u32, output_rate: u32) {
        self.unity = source_rate as f64 / output_rate.max(1) as f64;
    }

    /// Source-to-output rate ratio that plays the buffer at its own pitch
    pub fn unity(&self) -> f64 {
        self.unity
    }

    /// Latch octave, tune and FM controls for the coming block
    pub fn begin_block(&mut self, snapshot: &ControlSnapshot) {
        self.base = base_ratio(snapshot.octave, normalize_bipolar(snapshot.tune));
        self.depth = fm_depth(snapshot.fm_depth);
        self.fm_target = normalize_bipolar(snapshot.fm_signal);
    }

    /// Playback ratio (relative to the source rate) with FM applied,
    /// clamped to `±max_rate`
    pub fn ratio(&self) -> f64 {
        apply_fm(self.base, self.depth, self.fm_state).clamp(-self.max_rate, self.max_rate)
    }

    /// Signed increment at the current modulator value
    #[inline]
    pub fn increment(&self, direction: Direction) -> i64 {
        ratio_to_phase(self.ratio() * self.unity) * direction.sign()
    }

    /// Advance the FM smoother by one sample and return the increment
    #[inline]
    pub fn next_increment(&mut self, direction: Direction) -> i64 {
        self.fm_state += (self.fm_target - self.fm_state) * self.smoothing;
        self.increment(direction)
    }

    /// Jump the modulator to its target
    #[cfg(test)]
    pub fn settle(&mut self) {
        self.fm_state = self.fm_target;
    }
}
