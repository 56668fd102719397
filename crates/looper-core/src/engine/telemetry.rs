//! Playback telemetry
//!
//! The engine publishes one snapshot per block; any number of readers on
//! other threads can take consistent copies. A sequence counter makes the
//! multi-field record tear-free without locks:
//!
//! - writer: bump to odd, store fields, bump to even
//! - reader: read seq (retry while odd), copy fields, re-read seq and retry
//!   if it moved
//!
//! The writer never waits on readers.

use std::sync::atomic::{fence, AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::types::{DiagFlags, Direction, PlaybackMode, TransportState, CONTROL_MAX};

/// Attempts `read()` makes before returning a possibly stale copy
const READ_RETRIES: usize = 64;

/// A consistent view of the engine after one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    pub active_start: u32,
    pub active_end: u32,
    pub pending_start: u32,
    pub pending_end: u32,
    /// Sample index of the primary cursor (the head during a crossfade)
    pub playhead: u32,
    /// Tail cursor during a crossfade, otherwise 0
    pub secondary_playhead: u32,
    pub crossfade_active: bool,
    pub total_samples: u32,
    pub state: TransportState,
    pub mode: PlaybackMode,
    pub direction: Direction,
    pub diag: DiagFlags,
    /// Loop wraps, reflections and finished crossfades since the last bind
    pub loop_events: u32,
}

impl TelemetrySnapshot {
    pub fn active_len(&self) -> u32 {
        self.active_end.saturating_sub(self.active_start)
    }

    /// Playhead within the active region as 0..=4095
    pub fn playhead_norm(&self) -> u16 {
        let len = self.active_len();
        if len < 2 {
            return 0;
        }
        let offset = self.playhead.saturating_sub(self.active_start).min(len - 1);
        (offset as u64 * CONTROL_MAX as u64 / (len - 1) as u64) as u16
    }

    /// Active start as a 12-bit fraction of the buffer
    pub fn start_q12(&self) -> u16 {
        to_q12(self.active_start, self.total_samples)
    }

    /// Active length as a 12-bit fraction of the buffer
    pub fn len_q12(&self) -> u16 {
        to_q12(self.active_len(), self.total_samples)
    }
}

fn to_q12(value: u32, total: u32) -> u16 {
    if total == 0 {
        return 0;
    }
    (value.min(total) as u64 * CONTROL_MAX as u64 / total as u64) as u16
}

/// Engine-side index as a telemetry field, saturating at `u32::MAX`
pub(crate) fn clamp_u32(value: usize) -> u32 {
    value.min(u32::MAX as usize) as u32
}

/// Seqlock-protected telemetry block
pub struct Telemetry {
    seq: AtomicU32,
    active_start: AtomicU32,
    active_end: AtomicU32,
    pending_start: AtomicU32,
    pending_end: AtomicU32,
    playhead: AtomicU32,
    secondary_playhead: AtomicU32,
    crossfade_active: AtomicBool,
    total_samples: AtomicU32,
    state: AtomicU8,
    mode: AtomicU8,
    reverse: AtomicBool,
    diag: AtomicU16,
    loop_events: AtomicU32,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            active_start: AtomicU32::new(0),
            active_end: AtomicU32::new(0),
            pending_start: AtomicU32::new(0),
            pending_end: AtomicU32::new(0),
            playhead: AtomicU32::new(0),
            secondary_playhead: AtomicU32::new(0),
            crossfade_active: AtomicBool::new(false),
            total_samples: AtomicU32::new(0),
            state: AtomicU8::new(TransportState::Idle as u8),
            mode: AtomicU8::new(PlaybackMode::Forward as u8),
            reverse: AtomicBool::new(false),
            diag: AtomicU16::new(0),
            loop_events: AtomicU32::new(0),
        }
    }

    /// Publish a snapshot. Single writer only (the audio context).
    pub fn publish(&self, snapshot: &TelemetrySnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.active_start.store(snapshot.active_start, Ordering::Relaxed);
        self.active_end.store(snapshot.active_end, Ordering::Relaxed);
        self.pending_start.store(snapshot.pending_start, Ordering::Relaxed);
        self.pending_end.store(snapshot.pending_end, Ordering::Relaxed);
        self.playhead.store(snapshot.playhead, Ordering::Relaxed);
        self.secondary_playhead.store(snapshot.secondary_playhead, Ordering::Relaxed);
        self.crossfade_active.store(snapshot.crossfade_active, Ordering::Relaxed);
        self.total_samples.store(snapshot.total_samples, Ordering::Relaxed);
        self.state.store(snapshot.state as u8, Ordering::Relaxed);
        self.mode.store(snapshot.mode as u8, Ordering::Relaxed);
        self.reverse.store(snapshot.direction == Direction::Reverse, Ordering::Relaxed);
        self.diag.store(snapshot.diag.bits(), Ordering::Relaxed);
        self.loop_events.store(snapshot.loop_events, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// One read attempt; `None` if a publish was in progress or overlapped
    pub fn try_read(&self) -> Option<TelemetrySnapshot> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let snapshot = self.load_fields();
        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        (before == after).then_some(snapshot)
    }

    /// Consistent snapshot, retrying while the writer is active.
    ///
    /// Gives up after a bounded number of attempts and returns the last
    /// copy, which may mix two publishes.
    pub fn read(&self) -> TelemetrySnapshot {
        for _ in 0..READ_RETRIES {
            if let Some(snapshot) = self.try_read() {
                return snapshot;
            }
            std::hint::spin_loop();
        }
        self.load_fields()
    }

    /// Number of completed publishes
    pub fn sequence(&self) -> u32 {
        self.seq.load(Ordering::Acquire) / 2
    }

    fn load_fields(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            active_start: self.active_start.load(Ordering::Relaxed),
            active_end: self.active_end.load(Ordering::Relaxed),
            pending_start: self.pending_start.load(Ordering::Relaxed),
            pending_end: self.pending_end.load(Ordering::Relaxed),
            playhead: self.playhead.load(Ordering::Relaxed),
            secondary_playhead: self.secondary_playhead.load(Ordering::Relaxed),
            crossfade_active: self.crossfade_active.load(Ordering::Relaxed),
            total_samples: self.total_samples.load(Ordering::Relaxed),
            state: TransportState::from_u8(self.state.load(Ordering::Relaxed)),
            mode: PlaybackMode::from_u8(self.mode.load(Ordering::Relaxed)),
            direction: if self.reverse.load(Ordering::Relaxed) {
                Direction::Reverse
            } else {
                Direction::Forward
            },
            diag: DiagFlags::from_bits_truncate(self.diag.load(Ordering::Relaxed)),
            loop_events: self.loop_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
