//! Crossfade sessions
//!
//! A session blends the end of the old loop (the *tail*) into the beginning
//! of the new one (the *head*) with equal-power gains. Both cursors run
//! inside their own sub-region, and the session lasts a fixed number of
//! output samples computed from the length and the increment at the start.

use crate::config::CrossfadeFmPolicy;
use crate::fixed::{equal_power_gains, gain_to_q15, phase_frac, phase_index, saturate_i16};
use crate::types::{Direction, CONTROL_MAX};

use super::interpolate;
use super::region::{head_phase, LoopRegion};

/// Longest crossfade both regions can hold: half the shorter one
#[inline]
pub fn max_length(active_len: usize, pending_len: usize) -> usize {
    active_len.min(pending_len) / 2
}

/// Shortest crossfade allowed, reduced for tiny regions
#[inline]
pub fn min_length(max_both: usize, configured_min: usize) -> usize {
    if max_both >= 2 * configured_min {
        configured_min
    } else {
        max_both / 2
    }
}

/// Length the crossfade control asks for
#[inline]
pub fn requested_length(control: u16, max_both: usize) -> usize {
    (max_both as u64 * control.min(CONTROL_MAX) as u64 / CONTROL_MAX as u64) as usize
}

/// Clamp a requested length into `[min, max_both]`, never below 1.
/// The flag reports whether clamping changed the value.
pub fn effective_length(requested: usize, configured_min: usize, max_both: usize) -> (usize, bool) {
    let lo = min_length(max_both, configured_min).min(max_both);
    let length = requested.clamp(lo, max_both).max(1);
    (length, length != requested)
}

/// Output samples needed to cover `length` source samples at `increment`
pub fn session_steps(length: usize, increment: i64) -> u32 {
    let magnitude = increment.unsigned_abs() as u128;
    if magnitude == 0 {
        return length.max(1).min(u32::MAX as usize) as u32;
    }
    let span = (length as u128) << 32;
    let steps = span.div_ceil(magnitude);
    steps.clamp(1, u32::MAX as u128) as u32
}

/// One rendered crossfade sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadeStep {
    pub sample: i16,
    pub clamped: bool,
    pub finished: bool,
}

/// A running tail-to-head blend
#[derive(Debug, Clone)]
pub struct CrossfadeSession {
    total: u32,
    remaining: u32,
    tail: LoopRegion,
    tail_phase: i64,
    head: LoopRegion,
    head_phase: i64,
    /// Increment captured at the start, used under the locked policy
    increment: i64,
    direction: Direction,
}

impl CrossfadeSession {
    /// Start a session at `phase` in `active`, blending into `pending`.
    ///
    /// The tail is the `length`-sample window of `active` the playhead is
    /// in, clamped into the region. The head cursor starts the same number
    /// of samples in from the entry edge of `pending`, with the same
    /// fraction, so both cursors finish together.
    pub fn begin(phase: i64, active: LoopRegion, pending: LoopRegion, length: usize, increment: i64) -> Self {
        let direction = Direction::of_increment(increment, Direction::Forward);
        let phase = active.clamp(phase);
        let index = phase_index(phase) as usize;

        let tail = active.window_at(index, length, direction);
        let offset = match direction {
            Direction::Forward => index - tail.start,
            Direction::Reverse => tail.end - 1 - index,
        };
        let head_phase = head_phase(&pending, offset, phase_frac(phase), direction);
        let total = session_steps(tail.len(), increment);

        Self {
            total,
            remaining: total,
            tail,
            tail_phase: tail.wrap(phase),
            head: pending,
            head_phase,
            increment,
            direction,
        }
    }

    /// Render one blended sample and advance both cursors
    pub fn step(&mut self, samples: &[i16], live_increment: i64, policy: CrossfadeFmPolicy) -> CrossfadeStep {
        let increment = match policy {
            CrossfadeFmPolicy::Locked => self.increment,
            CrossfadeFmPolicy::Shared => live_increment,
        };
        let done = self.total - self.remaining;
        let t = (done + 1) as f32 / self.total as f32;
        let (fade_out, fade_in) = equal_power_gains(t);

        let a = interpolate::read(samples, self.tail_phase, self.tail);
        let b = interpolate::read(samples, self.head_phase, self.head);
        let mixed = (a.sample as i64 * gain_to_q15(fade_out) as i64
            + b.sample as i64 * gain_to_q15(fade_in) as i64
            + (1 << 14))
            >> 15;

        self.tail_phase = self.tail.wrap(self.tail_phase.saturating_add(increment));
        self.head_phase = self.head.wrap(self.head_phase.saturating_add(increment));
        self.remaining = self.remaining.saturating_sub(1);

        CrossfadeStep {
            sample: saturate_i16(mixed),
            clamped: a.clamped || b.clamped,
            finished: self.remaining == 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn tail_region(&self) -> LoopRegion {
        self.tail
    }

    pub fn tail_phase(&self) -> i64 {
        self.tail_phase
    }

    /// Region that becomes active when the session finishes
    pub fn head_region(&self) -> LoopRegion {
        self.head
    }

    pub fn head_phase(&self) -> i64 {
        self.head_phase
    }

    pub fn increment(&self) -> i64 {
        self.increment
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{phase_from_index, PHASE_ONE};

    #[test]
    fn test_length_limits() {
        assert_eq!(max_length(2048, 2048), 1024);
        assert_eq!(max_length(2048, 500), 250);
        assert_eq!(min_length(1024, 8), 8);
        assert_eq!(min_length(10, 8), 5);
        assert_eq!(requested_length(0, 1024), 0);
        assert_eq!(requested_length(CONTROL_MAX, 1024), 1024);
        assert_eq!(requested_length(1024, 1024), 256);
    }

    #[test]
    fn test_effective_length_clamps() {
        assert_eq!(effective_length(256, 8, 1024), (256, false));
        assert_eq!(effective_length(2, 8, 1024), (8, true));
        assert_eq!(effective_length(5000, 8, 1024), (1024, true));
        assert_eq!(effective_length(0, 8, 0), (1, true));
    }

    #[test]
    fn test_session_steps() {
        assert_eq!(session_steps(256, PHASE_ONE), 256);
        assert_eq!(session_steps(256, -PHASE_ONE), 256);
        assert_eq!(session_steps(256, 2 * PHASE_ONE), 128);
        assert_eq!(session_steps(256, PHASE_ONE / 2), 512);
        // Non-integer ratios round up
        assert_eq!(session_steps(10, PHASE_ONE * 3), 4);
        assert_eq!(session_steps(1, 100 * PHASE_ONE), 1);
        assert_eq!(session_steps(64, 0), 64);
    }

    #[test]
    fn test_forward_session_from_loop_end() {
        let samples: Vec<i16> = (0..4096).map(|i| (i % 1000) as i16).collect();
        let active = LoopRegion::new(0, 2048);
        let pending = LoopRegion::new(2048, 4096);
        let phase = phase_from_index(2048 - 256 + 3) + 77;
        let session = CrossfadeSession::begin(phase, active, pending, 256, PHASE_ONE);

        assert_eq!(session.tail_region(), LoopRegion::new(1792, 2048));
        assert_eq!(session.tail_phase(), phase);
        assert_eq!(session.head_phase(), phase_from_index(2048 + 3) + 77);
        assert_eq!(session.total(), 256);
        assert!(samples.len() >= session.head_region().end);
    }

    #[test]
    fn test_reverse_session_mirrors() {
        let active = LoopRegion::new(1000, 3000);
        let pending = LoopRegion::new(5000, 9000);
        let phase = phase_from_index(1010);
        let session = CrossfadeSession::begin(phase, active, pending, 100, -PHASE_ONE);
        assert_eq!(session.direction(), Direction::Reverse);
        assert_eq!(session.tail_region(), LoopRegion::new(1000, 1100));
        // 89 samples from the tail's top edge, so 89 below the pending end
        assert_eq!(session.head_phase(), phase_from_index(9000 - 1 - 89));
    }

    #[test]
    fn test_session_runs_to_head() {
        let mut samples = vec![0i16; 4096];
        for s in samples[2048..].iter_mut() {
            *s = 10_000;
        }
        let active = LoopRegion::new(0, 2048);
        let pending = LoopRegion::new(2048, 4096);
        let mut session = CrossfadeSession::begin(phase_from_index(1792), active, pending, 256, PHASE_ONE);

        let mut outputs = Vec::new();
        loop {
            let step = session.step(&samples, 3 * PHASE_ONE, CrossfadeFmPolicy::Locked);
            assert!(!step.clamped);
            outputs.push(step.sample);
            if step.finished {
                break;
            }
        }
        assert_eq!(outputs.len(), 256);
        // Equal-power rise from the silent tail to the head level
        assert!(outputs.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*outputs.last().unwrap(), 10_000);
        // Locked policy ignored the live increment
        assert_eq!(session.head_phase(), phase_from_index(2048 + 256));
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn test_shared_policy_follows_live_increment() {
        let samples = vec![0i16; 4096];
        let active = LoopRegion::new(0, 2048);
        let pending = LoopRegion::new(2048, 4096);
        let start = phase_from_index(1900);
        let mut session = CrossfadeSession::begin(start, active, pending, 100, PHASE_ONE);
        session.step(&samples, -PHASE_ONE, CrossfadeFmPolicy::Shared);
        assert_eq!(session.tail_phase(), session.tail_region().wrap(start - PHASE_ONE));
    }
}
