//! Linear interpolation inside a loop region
//!
//! The sample at a Q32.32 phase is a blend of the two neighbours around it.
//! The region is a cycle: the neighbour of the last sample is the first, so
//! the blend at the seam never reads outside the loop. Which way the
//! playhead travels does not change which neighbours surround a position.

use crate::fixed::{phase_frac, phase_index};
use super::region::LoopRegion;

/// Interpolated sample plus whether the index had to be clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub sample: i16,
    pub clamped: bool,
}

impl Tap {
    const SILENT: Tap = Tap {
        sample: 0,
        clamped: false,
    };
}

/// Read `samples` at `phase`, confined to `region`.
///
/// Out-of-range indices are clamped into the region and reported. An empty
/// region, or one past the end of the data, reads as silence.
#[inline]
pub fn read(samples: &[i16], phase: i64, region: LoopRegion) -> Tap {
    let start = region.start;
    let end = region.end.min(samples.len());
    if end <= start {
        return Tap::SILENT;
    }

    let raw = phase_index(phase);
    let index = raw.clamp(start as i64, end as i64 - 1) as usize;
    let clamped = index as i64 != raw;

    let current = samples[index] as i64;
    let next = if index + 1 < end { index + 1 } else { start };
    let next = samples[next] as i64;

    // 16-bit weight from the top of the fraction
    let weight = (phase_frac(phase) >> 16) as i64;
    let value = current + (((next - current) * weight) >> 16);

    Tap {
        sample: value.clamp(i16::MIN as i64, i16::MAX as i64) as i16,
        clamped,
    }
}
