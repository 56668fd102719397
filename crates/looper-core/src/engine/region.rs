//! Loop regions
//!
//! The engine keeps two regions: the *active* one the playhead is confined
//! to, and the *pending* one derived from the current start/length
//! controls. Pending only becomes active at a loop boundary, on reset, or
//! when the active region is invalid.

use crate::fixed::{phase_from_index, phase_index, phase_with_frac};
use crate::types::{Direction, CONTROL_MAX};

use super::control::ControlSnapshot;

/// Half-open sample range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LoopRegion {
    pub start: usize,
    pub end: usize,
}

impl LoopRegion {
    pub const EMPTY: LoopRegion = LoopRegion { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the region is playable in a buffer of `total` samples.
    /// Buffers shorter than `min_len` only need a non-empty region.
    pub fn is_valid(&self, total: usize, min_len: usize) -> bool {
        !self.is_empty() && self.end <= total && self.len() >= min_len.min(total)
    }

    #[inline]
    pub fn contains(&self, index: i64) -> bool {
        index >= self.start as i64 && index < self.end as i64
    }

    #[inline]
    pub fn start_phase(&self) -> i64 {
        phase_from_index(self.start)
    }

    /// Phase one past the last sample
    #[inline]
    pub fn end_phase(&self) -> i64 {
        phase_from_index(self.end)
    }

    /// Largest phase inside the region
    #[inline]
    pub fn last_phase(&self) -> i64 {
        self.end_phase() - 1
    }

    /// Fold a phase back into the region with a single Euclidean modulo.
    /// Fractional bits survive the wrap.
    #[inline]
    pub fn wrap(&self, phase: i64) -> i64 {
        let span = (self.len() as i64) << 32;
        if span == 0 {
            return self.start_phase();
        }
        self.start_phase() + (phase - self.start_phase()).rem_euclid(span)
    }

    /// Clamp a phase into the region
    #[inline]
    pub fn clamp(&self, phase: i64) -> i64 {
        if self.is_empty() {
            return self.start_phase();
        }
        phase.clamp(self.start_phase(), self.last_phase())
    }

    /// Phase a fresh start in `direction` begins at
    pub fn entry_phase(&self, direction: Direction) -> i64 {
        match direction {
            Direction::Forward => self.start_phase(),
            Direction::Reverse => phase_from_index(self.end.saturating_sub(1).max(self.start)),
        }
    }

    /// Map a phase in `self` to the same distance from the edge it is
    /// travelling away from in `other`, keeping the fraction.
    ///
    /// Used for hard region swaps: a phase just past `self.start` lands just
    /// past `other.start`, one just below `self.end` lands below `other.end`.
    pub fn transfer(&self, phase: i64, other: &LoopRegion, direction: Direction) -> i64 {
        let offset = match direction {
            Direction::Forward => phase - self.start_phase(),
            Direction::Reverse => self.end_phase() - phase,
        };
        let mapped = match direction {
            Direction::Forward => other.start_phase() + offset,
            Direction::Reverse => other.end_phase() - offset,
        };
        other.wrap(mapped)
    }

    /// Window of `len` samples at the far end of travel that contains
    /// `index`, clamped to the region; the tail of a crossfade plays here.
    pub fn window_at(&self, index: usize, len: usize, direction: Direction) -> LoopRegion {
        if self.is_empty() {
            return *self;
        }
        let len = len.clamp(1, self.len());
        match direction {
            Direction::Forward => {
                let start = index.min(self.end.saturating_sub(len)).max(self.start);
                LoopRegion::new(start, start + len)
            }
            Direction::Reverse => {
                let end = (index + 1).max(self.start + len).min(self.end);
                LoopRegion::new(end - len, end)
            }
        }
    }

    /// Playhead position inside the region as 0..=CONTROL_MAX
    pub fn normalized(&self, phase: i64) -> u16 {
        if self.is_empty() {
            return 0;
        }
        let offset = (phase_index(phase) - self.start as i64).clamp(0, self.len() as i64 - 1);
        (offset as u64 * CONTROL_MAX as u64 / (self.len() as u64 - 1).max(1)) as u16
    }
}

/// Region selected by the start and length controls.
///
/// The start control covers `[0, total - min_len]` and the length control
/// covers `[min_len, total]`, both with rounding. The end is clipped to the
/// buffer, so a late start with a long length shortens the loop but never
/// below `min_len`. Buffers shorter than `min_len` always yield the whole
/// buffer.
pub fn propose(start_control: u16, length_control: u16, total: usize, min_len: usize) -> LoopRegion {
    if total == 0 {
        return LoopRegion::EMPTY;
    }
    let min_len = min_len.min(total);
    let span = (total - min_len) as u64;
    let scale = |control: u16| -> usize {
        let control = control.min(CONTROL_MAX) as u64;
        ((2 * control * span + CONTROL_MAX as u64) / (2 * CONTROL_MAX as u64)) as usize
    };
    let start = scale(start_control);
    let len = min_len + scale(length_control);
    LoopRegion::new(start, (start + len).min(total))
}

/// Tracks the active and pending regions for one buffer
#[derive(Debug, Clone)]
pub struct RegionManager {
    active: LoopRegion,
    pending: LoopRegion,
    min_loop_len: usize,
}

impl RegionManager {
    pub fn new(min_loop_len: usize) -> Self {
        Self {
            active: LoopRegion::EMPTY,
            pending: LoopRegion::EMPTY,
            min_loop_len,
        }
    }

    #[inline]
    pub fn active(&self) -> LoopRegion {
        self.active
    }

    #[inline]
    pub fn pending(&self) -> LoopRegion {
        self.pending
    }

    pub fn min_loop_len(&self) -> usize {
        self.min_loop_len
    }

    /// Recompute the pending region. The result only depends on the
    /// controls and `total`, so repeated calls are idempotent.
    pub fn update_pending(&mut self, snapshot: &ControlSnapshot, total: usize) {
        self.pending = propose(snapshot.loop_start, snapshot.loop_length, total, self.min_loop_len);
    }

    pub fn active_is_valid(&self, total: usize) -> bool {
        self.active.is_valid(total, self.min_loop_len)
    }

    #[inline]
    pub fn has_pending_change(&self) -> bool {
        self.pending != self.active
    }

    pub fn adopt_pending(&mut self) {
        self.active = self.pending;
    }

    /// Make `region` active directly (a finished crossfade's head region)
    pub fn set_active(&mut self, region: LoopRegion) {
        self.active = region;
    }

    /// Forget both regions; the next block resyncs from the controls
    pub fn invalidate(&mut self) {
        self.active = LoopRegion::EMPTY;
        self.pending = LoopRegion::EMPTY;
    }
}

/// Head cursor for a crossfade that is `k` samples into its tail:
/// the same distance from the entry edge of `region`, same fraction.
pub fn head_phase(region: &LoopRegion, k: usize, frac: u32, direction: Direction) -> i64 {
    if region.is_empty() {
        return region.start_phase();
    }
    let index = match direction {
        Direction::Forward => region.start + k,
        Direction::Reverse => region.end.saturating_sub(1 + k),
    };
    phase_with_frac(index.clamp(region.start, region.end - 1), frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::PHASE_ONE;

    #[test]
    fn test_full_range() {
        let region = propose(0, CONTROL_MAX, 10_000, 2048);
        assert_eq!(region, LoopRegion::new(0, 10_000));
        assert!(region.is_valid(10_000, 2048));
    }

    #[test]
    fn test_minimum_length_holds() {
        for total in [2048usize, 2049, 5000, 100_000] {
            for start in [0u16, 1, 1000, 2048, 4094, CONTROL_MAX] {
                for len in [0u16, 1, 2048, CONTROL_MAX] {
                    let region = propose(start, len, total, 2048);
                    assert!(region.end <= total);
                    assert!(region.len() >= 2048, "{:?} total {}", region, total);
                }
            }
        }
    }

    #[test]
    fn test_short_buffer_uses_whole_buffer() {
        for (start, len) in [(0, 0), (CONTROL_MAX, CONTROL_MAX), (2000, 10)] {
            assert_eq!(propose(start, len, 500, 2048), LoopRegion::new(0, 500));
        }
        assert_eq!(propose(100, 100, 0, 2048), LoopRegion::EMPTY);
        assert!(LoopRegion::new(0, 500).is_valid(500, 2048));
    }

    #[test]
    fn test_late_start_clips_length() {
        let region = propose(CONTROL_MAX, CONTROL_MAX, 10_000, 2048);
        assert_eq!(region, LoopRegion::new(7952, 10_000));
    }

    #[test]
    fn test_update_pending_is_idempotent() {
        let mut regions = RegionManager::new(2048);
        let snap = ControlSnapshot {
            loop_start: 1234,
            loop_length: 777,
            ..ControlSnapshot::default()
        };
        regions.update_pending(&snap, 50_000);
        let first = regions.pending();
        regions.update_pending(&snap, 50_000);
        assert_eq!(regions.pending(), first);
        assert_eq!(regions.active(), LoopRegion::EMPTY);
        assert!(regions.has_pending_change());

        regions.adopt_pending();
        assert!(regions.active_is_valid(50_000));
        assert!(!regions.has_pending_change());
        assert!(!regions.active_is_valid(first.end - 1));
    }

    #[test]
    fn test_wrap_is_euclidean() {
        let region = LoopRegion::new(100, 200);
        let frac = 0x8000_0000i64;
        assert_eq!(region.wrap(phase_from_index(200) + frac), phase_from_index(100) + frac);
        assert_eq!(region.wrap(phase_from_index(99) + frac), phase_from_index(199) + frac);
        // Several spans away still lands in one step
        assert_eq!(region.wrap(phase_from_index(100 + 350)), phase_from_index(150));
        assert_eq!(region.wrap(phase_from_index(150)), phase_from_index(150));
        assert_eq!(LoopRegion::EMPTY.wrap(12345), 0);
    }

    #[test]
    fn test_transfer_keeps_edge_distance() {
        let a = LoopRegion::new(0, 1000);
        let b = LoopRegion::new(5000, 7000);
        let past_start = phase_from_index(3) + 7;
        assert_eq!(a.transfer(past_start, &b, Direction::Forward), phase_from_index(5003) + 7);
        let below_end = phase_from_index(996);
        assert_eq!(a.transfer(below_end, &b, Direction::Reverse), phase_from_index(6996));
    }

    #[test]
    fn test_window_at() {
        let region = LoopRegion::new(0, 1000);
        assert_eq!(region.window_at(900, 256, Direction::Forward), LoopRegion::new(744, 1000));
        assert_eq!(region.window_at(500, 256, Direction::Forward), LoopRegion::new(500, 756));
        assert_eq!(region.window_at(100, 256, Direction::Reverse), LoopRegion::new(0, 256));
        assert_eq!(region.window_at(600, 256, Direction::Reverse), LoopRegion::new(345, 601));
    }

    #[test]
    fn test_head_phase() {
        let region = LoopRegion::new(2048, 4096);
        assert_eq!(head_phase(&region, 5, 9, Direction::Forward), phase_from_index(2053) + 9);
        assert_eq!(head_phase(&region, 5, 9, Direction::Reverse), phase_from_index(4090) + 9);
    }

    #[test]
    fn test_entry_and_clamp() {
        let region = LoopRegion::new(10, 20);
        assert_eq!(region.entry_phase(Direction::Forward), 10 * PHASE_ONE);
        assert_eq!(region.entry_phase(Direction::Reverse), 19 * PHASE_ONE);
        assert_eq!(region.clamp(0), 10 * PHASE_ONE);
        assert_eq!(region.clamp(i64::MAX), 20 * PHASE_ONE - 1);
        assert_eq!(region.normalized(10 * PHASE_ONE), 0);
        assert_eq!(region.normalized(19 * PHASE_ONE), CONTROL_MAX);
    }
}
