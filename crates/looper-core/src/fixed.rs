//! Fixed-point helpers
//!
//! Formats used by the engine:
//! - phase: Q32.32 in an `i64` (integer part = sample index)
//! - samples: Q1.15 in an `i16`
//! - filter state and `r`/`h` coefficients: Q2.30
//! - the SVF `g` coefficient: Q5.26 (tan() exceeds 2 near Nyquist)

use std::f32::consts::FRAC_PI_2;

/// Fractional bits of the phase accumulator
pub const FRAC_BITS: u32 = 32;

/// One sample step in Q32.32
pub const PHASE_ONE: i64 = 1 << FRAC_BITS;

/// Unity gain in Q15, as a 32-bit multiplier
pub const Q15_ONE: i32 = 1 << 15;

const Q30_SCALE: f64 = (1u64 << 30) as f64;
const Q26_SCALE: f64 = (1u64 << 26) as f64;

#[inline]
pub fn phase_from_index(index: usize) -> i64 {
    (index as i64) << FRAC_BITS
}

/// Integer sample index of a phase (floor, also for negative phases)
#[inline]
pub fn phase_index(phase: i64) -> i64 {
    phase >> FRAC_BITS
}

#[inline]
pub fn phase_frac(phase: i64) -> u32 {
    phase as u32
}

/// Phase at `index` carrying the fractional bits `frac`
#[inline]
pub fn phase_with_frac(index: usize, frac: u32) -> i64 {
    phase_from_index(index) | frac as i64
}

/// Convert a playback ratio to a Q32.32 increment.
///
/// Float-to-int `as` saturates, and NaN maps to zero.
#[inline]
pub fn ratio_to_phase(ratio: f64) -> i64 {
    (ratio * PHASE_ONE as f64) as i64
}

#[inline]
pub fn saturate_i16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

#[inline]
pub fn clamp_guard(value: i64, limit: i64) -> i64 {
    value.clamp(-limit, limit)
}

pub fn float_to_q30(value: f32) -> i32 {
    let value = value.clamp(-1.999_999, 1.999_999) as f64;
    (value * Q30_SCALE).round() as i32
}

pub fn float_to_q26(value: f32) -> i32 {
    let value = value.clamp(-31.999_99, 31.999_99) as f64;
    (value * Q26_SCALE).round() as i32
}

pub fn q30_to_float(value: i32) -> f32 {
    (value as f64 / Q30_SCALE) as f32
}

pub fn q26_to_float(value: i32) -> f32 {
    (value as f64 / Q26_SCALE) as f32
}

/// Constant-power crossfade gains `(fade_out, fade_in)` at progress `t`.
#[inline]
pub fn equal_power_gains(t: f32) -> (f32, f32) {
    let t = t.clamp(0.0, 1.0);
    ((FRAC_PI_2 * (1.0 - t)).sin(), (FRAC_PI_2 * t).sin())
}

/// Gain in `[0, 1]` as a Q15 multiplier (1.0 maps to 32768)
#[inline]
pub fn gain_to_q15(gain: f32) -> i32 {
    ((gain * Q15_ONE as f32).round() as i32).clamp(0, Q15_ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_power_identity() {
        for step in 0..=1000 {
            let t = step as f32 / 1000.0;
            let (out, inn) = equal_power_gains(t);
            assert!((out * out + inn * inn - 1.0).abs() < 1e-5, "t = {}", t);
        }
        assert_eq!(equal_power_gains(0.0).1, 0.0);
        assert!((equal_power_gains(1.0).1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_phase_parts() {
        let phase = phase_with_frac(1234, 0x8000_0000);
        assert_eq!(phase_index(phase), 1234);
        assert_eq!(phase_frac(phase), 0x8000_0000);
        // Floor semantics below zero
        assert_eq!(phase_index(-1), -1);
        assert_eq!(phase_index(-PHASE_ONE), -1);
    }

    #[test]
    fn test_ratio_to_phase() {
        assert_eq!(ratio_to_phase(1.0), PHASE_ONE);
        assert_eq!(ratio_to_phase(-0.5), -PHASE_ONE / 2);
        assert_eq!(ratio_to_phase(f64::NAN), 0);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(saturate_i16(40_000), i16::MAX);
        assert_eq!(saturate_i16(-40_000), i16::MIN);
        assert_eq!(saturate_i16(-12), -12);
        assert_eq!(clamp_guard(1 << 40, 1 << 33), 1 << 33);
    }

    #[test]
    fn test_q_conversions_clamp() {
        assert_eq!(float_to_q30(0.5), 1 << 29);
        assert!(float_to_q30(5.0) < i32::MAX);
        assert!(float_to_q30(5.0) > (1 << 30));
        assert_eq!(float_to_q26(1.0), 1 << 26);
        assert!((q26_to_float(float_to_q26(3.25)) - 3.25).abs() < 1e-6);
        assert!((q30_to_float(float_to_q30(-0.75)) + 0.75).abs() < 1e-6);
        assert_eq!(gain_to_q15(1.0), Q15_ONE);
        assert_eq!(gain_to_q15(-0.2), 0);
    }
}
