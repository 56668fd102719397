//! 8-pole ladder band-pass
//!
//! Four one-pole low-pass stages followed by four one-pole high-pass
//! stages. Each high-pass stage outputs its input minus its own low-pass,
//! so every stage is the same Q15 one-pole update with a saturating store.

use super::ResonantFilter;
use crate::types::CONTROL_MAX;

/// Lowest usable low-pass coefficient (Q15)
pub const MIN_LP_COEFF: u16 = 1024;
/// Highest low-pass coefficient (Q15)
pub const MAX_LP_COEFF: u16 = 32767;
/// Lowest high-pass coefficient (Q15)
pub const MIN_HP_COEFF: u16 = 512;

/// Map the cutoff control to a low-pass coefficient.
///
/// Control 0 maps to coefficient 0, which bypasses the filter.
pub fn cutoff_coefficient(control: u16) -> u16 {
    if control == 0 {
        return 0;
    }
    let control = control.min(CONTROL_MAX) as u32;
    let coeff = MIN_LP_COEFF as u32 + control * 31743 / CONTROL_MAX as u32;
    coeff.clamp(MIN_LP_COEFF as u32, MAX_LP_COEFF as u32) as u16
}

/// Map the resonance control to the Q coefficient (512..=24576)
pub fn q_coefficient(control: u16) -> u16 {
    let control = control.min(CONTROL_MAX) as u32;
    (512 + control * 24064 / CONTROL_MAX as u32).clamp(512, 24576) as u16
}

/// Derive the high-pass coefficient from the low-pass one.
///
/// The Q coefficient scales the low-pass coefficient by 0.3..0.8 (0 gives a
/// quarter). The result never drops below [`MIN_HP_COEFF`] and always stays
/// at least `lp / 16` below the low-pass coefficient.
pub fn highpass_coefficient(lp_coeff: u16, q_coeff: u16) -> u16 {
    let lp = lp_coeff.clamp(MIN_LP_COEFF, MAX_LP_COEFF) as u32;

    let mut hp = if q_coeff > 0 {
        let q_mult = 9830 + (q_coeff as u32 * 16384) / 32767;
        ((lp * q_mult) >> 15).min(lp)
    } else {
        lp >> 2
    };

    hp = hp.max(MIN_HP_COEFF as u32).min(lp);

    let min_gap = lp >> 4;
    if hp > lp - min_gap {
        hp = lp - min_gap;
    }
    hp as u16
}

/// One Q15 one-pole low-pass step, saturating the stored pole
#[inline]
fn one_pole(pole: &mut i16, input: i16, coeff: u16) -> i16 {
    let diff = input as i64 - *pole as i64;
    let next = *pole as i64 + ((diff * coeff as i64) >> 15);
    *pole = next.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
    *pole
}

/// 8-pole ladder band-pass on Q15 samples
#[derive(Debug, Clone, Default)]
pub struct LadderBandpass {
    lp_poles: [i16; 4],
    hp_poles: [i16; 4],
    primed: bool,
    lp_coeff: u16,
    hp_coeff: u16,
}

impl LadderBandpass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set raw Q15 coefficients. A cutoff coefficient of 0 bypasses the
    /// filter and clears all pole state.
    pub fn set_coefficients(&mut self, cutoff_coeff: u16, q_coeff: u16) {
        if cutoff_coeff == 0 {
            if self.lp_coeff != 0 || self.primed {
                self.reset();
            }
            self.lp_coeff = 0;
            self.hp_coeff = 0;
            return;
        }
        self.lp_coeff = cutoff_coeff.clamp(MIN_LP_COEFF, MAX_LP_COEFF);
        self.hp_coeff = highpass_coefficient(self.lp_coeff, q_coeff);
    }

    pub fn lp_coefficient(&self) -> u16 {
        self.lp_coeff
    }

    pub fn hp_coefficient(&self) -> u16 {
        self.hp_coeff
    }

    /// Start every stage at steady state for a DC input of `input`
    fn prime(&mut self, input: i16) {
        self.lp_poles = [input; 4];
        // The first HP stage sees the LP output; its own low-pass settles
        // at that value, so its output and all later stages start at zero
        self.hp_poles = [input, 0, 0, 0];
        self.primed = true;
    }
}

impl ResonantFilter for LadderBandpass {
    fn set_controls(&mut self, cutoff: u16, resonance: u16) {
        self.set_coefficients(cutoff_coefficient(cutoff), q_coefficient(resonance));
    }

    #[inline]
    fn process(&mut self, input: i16) -> i16 {
        if self.lp_coeff == 0 {
            return input;
        }
        if !self.primed {
            self.prime(input);
        }

        let mut current = input;
        for pole in self.lp_poles.iter_mut() {
            current = one_pole(pole, current, self.lp_coeff);
        }
        for pole in self.hp_poles.iter_mut() {
            let low = one_pole(pole, current, self.hp_coeff);
            current = (current as i32 - low as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
        current
    }

    fn reset(&mut self) {
        self.lp_poles = [0; 4];
        self.hp_poles = [0; 4];
        self.primed = false;
    }

    fn is_bypassed(&self) -> bool {
        self.lp_coeff == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_mapping() {
        assert_eq!(cutoff_coefficient(0), 0);
        assert_eq!(cutoff_coefficient(1), MIN_LP_COEFF + 7);
        assert_eq!(cutoff_coefficient(CONTROL_MAX), MAX_LP_COEFF);
        assert_eq!(cutoff_coefficient(u16::MAX), MAX_LP_COEFF);
        assert_eq!(q_coefficient(0), 512);
        assert_eq!(q_coefficient(CONTROL_MAX), 24576);
    }

    #[test]
    fn test_highpass_stays_below_lowpass() {
        for lp in [MIN_LP_COEFF, 2000, 8000, 16000, MAX_LP_COEFF] {
            for q in [0u16, 512, 8000, 24576, 32767] {
                let hp = highpass_coefficient(lp, q);
                assert!(hp >= MIN_HP_COEFF.min(lp - lp / 16), "lp {} q {}", lp, q);
                assert!(hp <= lp - (lp >> 4), "lp {} q {} hp {}", lp, q, hp);
            }
        }
        // Q of zero opens the band to a quarter of the low-pass coefficient
        assert_eq!(highpass_coefficient(16000, 0), 4000);
    }

    #[test]
    fn test_zero_cutoff_bypasses_and_resets() {
        let mut filter = LadderBandpass::new();
        filter.set_controls(2000, 2000);
        for i in 0..500 {
            filter.process(((i % 40) * 800 - 16000) as i16);
        }
        assert!(filter.primed);

        filter.set_coefficients(0, 0);
        assert!(filter.is_bypassed());
        assert_eq!(filter.lp_poles, [0; 4]);
        assert_eq!(filter.hp_poles, [0; 4]);
        for x in [-32768i16, -5, 0, 7, 12345, 32767] {
            assert_eq!(filter.process(x), x);
        }
    }

    #[test]
    fn test_dc_is_rejected() {
        let mut filter = LadderBandpass::new();
        filter.set_controls(2048, 1024);
        let mut last = 0;
        for _ in 0..20_000 {
            last = filter.process(12_000);
        }
        assert!(last.abs() < 64, "residual DC {}", last);
    }

    #[test]
    fn test_priming_avoids_step_transient() {
        let mut filter = LadderBandpass::new();
        filter.set_controls(3000, 2000);
        // First sample of a constant signal must not kick the output
        assert_eq!(filter.process(20_000), 0);
    }

    #[test]
    fn test_full_scale_input_stays_bounded() {
        let mut filter = LadderBandpass::new();
        filter.set_controls(CONTROL_MAX, CONTROL_MAX);
        for i in 0..10_000 {
            let x = if (i / 3) % 2 == 0 { i16::MAX } else { i16::MIN };
            // Saturating stages; this must simply never panic on overflow
            let _ = filter.process(x);
        }
    }
}
