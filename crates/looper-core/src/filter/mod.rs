//! Resonant output filters
//!
//! Two interchangeable fixed-point band-pass designs behind one trait:
//!
//! - [`LadderBandpass`]: 8-pole ladder (4 LP + 4 HP one-pole stages)
//! - [`StateVariableBandpass`]: 2-pole TPT SVF with gain compensation
//!
//! The engine is generic over [`ResonantFilter`], so the per-sample call is
//! statically dispatched. [`FilterChain`] selects a design at runtime from
//! [`FilterKind`] with a `match`, which keeps that path free of vtables too.

mod gain_table;
mod ladder;
mod svf;

pub use gain_table::GainTable;
pub use ladder::{cutoff_coefficient, highpass_coefficient, q_coefficient, LadderBandpass};
pub use svf::{cutoff_hz, StateVariableBandpass};

use crate::config::FilterKind;

/// A filter driven by the two filter controls.
///
/// A cutoff control of 0 must bypass the filter (output == input) and clear
/// its state, so re-enabling never replays stale energy.
pub trait ResonantFilter {
    /// Map the cutoff/resonance controls (0..=4095) to coefficients.
    /// Called once per block.
    fn set_controls(&mut self, cutoff: u16, resonance: u16);

    /// Filter one Q15 sample
    fn process(&mut self, input: i16) -> i16;

    /// Clear all internal state
    fn reset(&mut self);

    fn is_bypassed(&self) -> bool;
}

/// Runtime-selected filter
pub enum FilterChain {
    Ladder(LadderBandpass),
    StateVariable(StateVariableBandpass),
}

impl FilterChain {
    pub fn new(kind: FilterKind, sample_rate: u32) -> Self {
        match kind {
            FilterKind::Ladder => FilterChain::Ladder(LadderBandpass::new()),
            FilterKind::StateVariable => {
                FilterChain::StateVariable(StateVariableBandpass::new(sample_rate))
            }
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterChain::Ladder(_) => FilterKind::Ladder,
            FilterChain::StateVariable(_) => FilterKind::StateVariable,
        }
    }
}

impl ResonantFilter for FilterChain {
    #[inline]
    fn set_controls(&mut self, cutoff: u16, resonance: u16) {
        match self {
            FilterChain::Ladder(f) => f.set_controls(cutoff, resonance),
            FilterChain::StateVariable(f) => f.set_controls(cutoff, resonance),
        }
    }

    #[inline]
    fn process(&mut self, input: i16) -> i16 {
        match self {
            FilterChain::Ladder(f) => f.process(input),
            FilterChain::StateVariable(f) => f.process(input),
        }
    }

    fn reset(&mut self) {
        match self {
            FilterChain::Ladder(f) => f.reset(),
            FilterChain::StateVariable(f) => f.reset(),
        }
    }

    fn is_bypassed(&self) -> bool {
        match self {
            FilterChain::Ladder(f) => f.is_bypassed(),
            FilterChain::StateVariable(f) => f.is_bypassed(),
        }
    }
}
