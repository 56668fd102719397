//! Two-pole TPT state-variable band-pass in fixed point
//!
//! Coefficients are derived in floating point when the controls change;
//! the per-sample path is integer only. State and the `r`/`h` coefficients
//! are Q2.30, `g` is Q5.26.

use std::f32::consts::PI;

use super::gain_table::GainTable;
use super::ResonantFilter;
use crate::fixed::{clamp_guard, float_to_q26, float_to_q30, q26_to_float, q30_to_float};
use crate::types::CONTROL_MAX;

/// Guard for every intermediate sum (|x| <= 4.0 in Q2.30).
///
/// Coefficients are below 2.0 in their own format, so coefficient × state
/// products stay inside `i64`.
const STATE_LIMIT: i64 = 1 << 32;

pub const MIN_CUTOFF_HZ: f32 = 1.0;
/// Upper cutoff as a fraction of the sample rate
pub const MAX_CUTOFF_RATIO: f32 = 0.49 * 0.5;
pub const MIN_Q: f32 = 0.10;
pub const MAX_Q: f32 = 120.0;

/// Bottom of the cutoff control sweep
pub const SWEEP_MIN_HZ: f32 = 20.0;
/// Top of the cutoff control sweep
pub const SWEEP_MAX_HZ: f32 = 10_000.0;

const FEEDBACK_STEPS: usize = 256;

/// Cutoff frequency for a control value (exponential 20 Hz..10 kHz).
///
/// Returns `None` for control 0, which bypasses the filter.
pub fn cutoff_hz(control: u16) -> Option<f32> {
    if control == 0 {
        return None;
    }
    let x = control.min(CONTROL_MAX) as f32 / CONTROL_MAX as f32;
    Some(SWEEP_MIN_HZ * (SWEEP_MAX_HZ / SWEEP_MIN_HZ).powf(x))
}

/// Feedback LUT index (0..=255) for a resonance control
pub fn feedback_index(control: u16) -> usize {
    let feedback_q15 = control.min(CONTROL_MAX) as u32 * 32767 / CONTROL_MAX as u32;
    ((feedback_q15 >> 7) as usize).min(FEEDBACK_STEPS - 1)
}

/// Q for a feedback amount in [0, 1], log-spaced over [MIN_Q, MAX_Q]
fn feedback_to_q(feedback: f32) -> f32 {
    let (lo, hi) = (MIN_Q.ln(), MAX_Q.ln());
    (lo + feedback.clamp(0.0, 1.0) * (hi - lo)).exp()
}

/// Quantized coefficients `(g_q26, r_q30, h_q30)` for a cutoff and Q.
///
/// `r` is limited so the combined damping term stays representable.
pub(crate) fn quantized_coefficients(cutoff_hz: f32, q: f32, sample_rate: f32) -> (i32, i32, i32) {
    let fc = cutoff_hz.clamp(MIN_CUTOFF_HZ, sample_rate * MAX_CUTOFF_RATIO);
    let q = q.clamp(MIN_Q, MAX_Q);

    let mut g = (PI * fc / sample_rate).tan();
    if !g.is_finite() {
        g = 0.0;
    }
    let g_q26 = float_to_q26(g);
    let r_q30 = float_to_q30(1.0 / q);

    // h from the quantized values so the recursion matches the table
    let g = q26_to_float(g_q26);
    let r = q30_to_float(r_q30);
    let denom = 1.0 + g * (g + r);
    let h_q30 = float_to_q30(if denom > 0.0 { 1.0 / denom } else { 1.0 });

    (g_q26, r_q30, h_q30)
}

#[inline]
fn mul_q30(a: i32, b: i64) -> i64 {
    (a as i64 * b) >> 30
}

#[inline]
fn mul_q26(a: i32, b: i64) -> i64 {
    (a as i64 * b) >> 26
}

/// Resonant 2-pole band-pass with table-driven gain compensation
pub struct StateVariableBandpass {
    ic1: i64,
    ic2: i64,
    g_q26: i32,
    r_q30: i32,
    h_q30: i32,
    gain_q15: u16,
    sample_rate: f32,
    cutoff_hz: f32,
    q: f32,
    bypassed: bool,
    last_controls: Option<(u16, u16)>,
    q_lut: [f32; FEEDBACK_STEPS],
    gains: GainTable,
}

impl StateVariableBandpass {
    /// Create a filter for `sample_rate`; it starts bypassed.
    ///
    /// Builds the feedback LUT and gain table, so construct it before
    /// playback starts.
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let mut q_lut = [0.0; FEEDBACK_STEPS];
        for (i, q) in q_lut.iter_mut().enumerate() {
            *q = feedback_to_q(i as f32 / (FEEDBACK_STEPS - 1) as f32);
        }
        Self {
            ic1: 0,
            ic2: 0,
            g_q26: 0,
            r_q30: 0,
            h_q30: 0,
            gain_q15: 0,
            sample_rate,
            cutoff_hz: 0.0,
            q: q_lut[0],
            bypassed: true,
            last_controls: None,
            q_lut,
            gains: GainTable::build(sample_rate),
        }
    }

    /// Set cutoff (Hz) and Q directly.
    pub fn set_params(&mut self, cutoff_hz: f32, q: f32) {
        let (g_q26, r_q30, h_q30) = quantized_coefficients(cutoff_hz, q, self.sample_rate);
        self.g_q26 = g_q26;
        self.r_q30 = r_q30;
        self.h_q30 = h_q30;
        self.cutoff_hz = cutoff_hz.clamp(MIN_CUTOFF_HZ, self.sample_rate * MAX_CUTOFF_RATIO);
        self.q = q.clamp(MIN_Q, MAX_Q);
        self.gain_q15 = self.gains.lookup(self.cutoff_hz, self.q);
        self.bypassed = false;
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_q15(&self) -> u16 {
        self.gain_q15
    }

    fn bypass(&mut self) {
        self.reset();
        self.bypassed = true;
        self.g_q26 = 0;
        self.r_q30 = 0;
        self.h_q30 = 0;
    }
}

impl ResonantFilter for StateVariableBandpass {
    fn set_controls(&mut self, cutoff: u16, resonance: u16) {
        if self.last_controls == Some((cutoff, resonance)) {
            return;
        }
        self.last_controls = Some((cutoff, resonance));

        match cutoff_hz(cutoff) {
            Some(fc) => {
                let q = self.q_lut[feedback_index(resonance)];
                self.set_params(fc, q);
            }
            None => self.bypass(),
        }
    }

    #[inline]
    fn process(&mut self, input: i16) -> i16 {
        if self.bypassed {
            return input;
        }

        // Compensation is applied ahead of the recursion, so at any Q the
        // resonant states peak near the input level instead of Q times it
        let x = clamp_guard(
            (((input as i64) << 15) * self.gain_q15 as i64) >> 15,
            STATE_LIMIT,
        );
        let ic1 = self.ic1;
        let ic2 = self.ic2;

        // Damping on ic1 is (r + g): the r-only form diverges once g > r
        let damping = mul_q30(self.r_q30, ic1) + mul_q26(self.g_q26, ic1);
        let hp_num = clamp_guard(x - ic2 - damping, STATE_LIMIT);
        let hp = clamp_guard(mul_q30(self.h_q30, hp_num), STATE_LIMIT);

        let g_hp = clamp_guard(mul_q26(self.g_q26, hp), STATE_LIMIT);
        let bp = clamp_guard(g_hp + ic1, STATE_LIMIT);

        let g_bp = clamp_guard(mul_q26(self.g_q26, bp), STATE_LIMIT);
        let lp = clamp_guard(g_bp + ic2, STATE_LIMIT);

        self.ic1 = clamp_guard(bp + g_hp, STATE_LIMIT);
        self.ic2 = clamp_guard(lp + g_bp, STATE_LIMIT);

        let y = (bp + (1 << 14)) >> 15;
        y.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    fn reset(&mut self) {
        self.ic1 = 0;
        self.ic2 = 0;
    }

    fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_peak(filter: &mut StateVariableBandpass, freq: f32, amplitude: f32) -> i32 {
        sine_peak_after(filter, freq, amplitude, 48_000, 4_800)
    }

    /// Peak output over the last `window` of `len` samples of a sine
    fn sine_peak_after(
        filter: &mut StateVariableBandpass,
        freq: f32,
        amplitude: f32,
        len: usize,
        window: usize,
    ) -> i32 {
        let sr = 48_000.0;
        let mut peak = 0;
        for n in 0..len {
            let phase = 2.0 * PI * ((freq as f64 * n as f64 / sr) % 1.0) as f32;
            let x = (amplitude * phase.sin()) as i16;
            let y = filter.process(x) as i32;
            if n >= len - window {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_cutoff_sweep_range() {
        assert_eq!(cutoff_hz(0), None);
        assert!((cutoff_hz(CONTROL_MAX).unwrap() - SWEEP_MAX_HZ).abs() < 1.0);
        assert!(cutoff_hz(1).unwrap() >= SWEEP_MIN_HZ);
        assert_eq!(feedback_index(0), 0);
        assert_eq!(feedback_index(CONTROL_MAX), 255);
    }

    #[test]
    fn test_zero_cutoff_bypasses_and_resets() {
        let mut filter = StateVariableBandpass::new(48_000);
        filter.set_controls(2500, 2000);
        for i in 0..1000 {
            filter.process(((i * 97) % 20_000 - 10_000) as i16);
        }
        assert!(filter.ic1 != 0 || filter.ic2 != 0);

        filter.set_controls(0, 2000);
        assert!(filter.is_bypassed());
        assert_eq!((filter.ic1, filter.ic2), (0, 0));
        for x in [-32768i16, -1, 0, 1, 9999, 32767] {
            assert_eq!(filter.process(x), x);
        }
    }

    #[test]
    fn test_peak_gain_near_unity_across_grid() {
        // Within 3 dB of unity at -12 dBFS and near full scale, up to Q = 120
        for cutoff in [1900u16, 2600, 3400, CONTROL_MAX] {
            for resonance in [0u16, 2000, 3300, CONTROL_MAX] {
                for amplitude in [8192.0f32, 24_000.0] {
                    let mut filter = StateVariableBandpass::new(48_000);
                    filter.set_controls(cutoff, resonance);
                    let fc = filter.cutoff_hz();
                    let peak = sine_peak_after(&mut filter, fc, amplitude, 96_000, 9_600);
                    let ratio = peak as f32 / amplitude;
                    assert!(
                        (0.707..=1.414).contains(&ratio),
                        "cutoff {} ({:.0} Hz) resonance {} (Q {:.1}) amplitude {}: gain {:.3}",
                        cutoff,
                        fc,
                        resonance,
                        filter.q(),
                        amplitude,
                        ratio
                    );
                }
            }
        }
    }

    #[test]
    fn test_off_band_attenuated() {
        let mut filter = StateVariableBandpass::new(48_000);
        filter.set_controls(2578, 3000);
        let fc = filter.cutoff_hz();
        let at_fc = sine_peak(&mut filter, fc, 8000.0);
        filter.reset();
        let far = sine_peak(&mut filter, fc * 8.0, 8000.0);
        assert!(far * 4 < at_fc, "at fc {} vs far {}", at_fc, far);
    }

    #[test]
    fn test_stable_at_extreme_resonance() {
        let mut filter = StateVariableBandpass::new(48_000);
        filter.set_controls(CONTROL_MAX, CONTROL_MAX);
        filter.process(i16::MAX);
        let mut tail = 0;
        for n in 0..96_000 {
            let y = filter.process(0) as i32;
            if n > 90_000 {
                tail = tail.max(y.abs());
            }
        }
        assert!(tail < 100, "ringing did not decay: {}", tail);
    }

    #[test]
    fn test_unchanged_controls_skip_recompute() {
        let mut filter = StateVariableBandpass::new(48_000);
        filter.set_controls(1000, 1000);
        let g = filter.g_q26;
        filter.g_q26 = 12345;
        filter.set_controls(1000, 1000);
        assert_eq!(filter.g_q26, 12345);
        filter.set_controls(1001, 1000);
        assert_ne!(filter.g_q26, 12345);
        assert!(filter.g_q26 >= g);
    }
}
