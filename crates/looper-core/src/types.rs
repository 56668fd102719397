//! Common types for the looper engine
//!
//! Transport and playback-mode enums, the diagnostic bitmask and the
//! constants that define the control and sample ranges.

use serde::{Deserialize, Serialize};

/// Largest value of a continuous control (12-bit ADC range)
pub const CONTROL_MAX: u16 = 4095;

/// Control value that normalizes to zero for bipolar controls (tune, FM)
pub const CONTROL_CENTER: u16 = 2048;

/// Highest octave switch position (0 = LFO mode, 4 = unity)
pub const MAX_OCTAVE: u8 = 7;

/// Octave position that plays at the source rate
pub const UNITY_OCTAVE: u8 = 4;

/// Default audio block size in samples
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Default output sample rate of the engine
pub const DEFAULT_OUTPUT_RATE: u32 = 48000;

/// Default minimum loop length in samples
pub const MIN_LOOP_LEN: usize = 2048;

/// Q15 silence
pub const SILENCE: i16 = 0;

/// Transport state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransportState {
    /// Nothing armed, output is silent
    #[default]
    Idle = 0,
    /// Buffer bound and armed, waiting for play
    Ready = 1,
    /// Rendering
    Playing = 2,
    /// Buffer bound, rendering suspended
    Paused = 3,
}

impl TransportState {
    /// Decode the value published through telemetry
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Ready,
            2 => TransportState::Playing,
            3 => TransportState::Paused,
            _ => TransportState::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Ready => "ready",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        }
    }
}

/// Playback mode selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PlaybackMode {
    #[default]
    Forward = 0,
    Reverse = 1,
    /// Ping-pong: the direction flips at each region edge
    Alternate = 2,
}

impl PlaybackMode {
    pub const ALL: [PlaybackMode; 3] = [
        PlaybackMode::Forward,
        PlaybackMode::Reverse,
        PlaybackMode::Alternate,
    ];

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackMode::Reverse,
            2 => PlaybackMode::Alternate,
            _ => PlaybackMode::Forward,
        }
    }

    /// Parse a user-facing mode name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "forward" | "fwd" | "f" => Some(PlaybackMode::Forward),
            "reverse" | "rev" | "r" => Some(PlaybackMode::Reverse),
            "alternate" | "alt" | "pingpong" | "a" => Some(PlaybackMode::Alternate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlaybackMode::Forward => "forward",
            PlaybackMode::Reverse => "reverse",
            PlaybackMode::Alternate => "alternate",
        }
    }

    /// Direction a fresh start travels in
    pub fn initial_direction(&self) -> Direction {
        match self {
            PlaybackMode::Reverse => Direction::Reverse,
            PlaybackMode::Forward | PlaybackMode::Alternate => Direction::Forward,
        }
    }
}

/// Direction of travel through the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Sign applied to the unsigned rate
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Direction of a signed phase increment (zero counts as `fallback`)
    #[inline]
    pub fn of_increment(increment: i64, fallback: Direction) -> Self {
        match increment.signum() {
            1 => Direction::Forward,
            -1 => Direction::Reverse,
            _ => fallback,
        }
    }
}

bitflags::bitflags! {
    /// Reasons the engine produced silence or had to correct itself.
    ///
    /// Flags accumulate over one render call and are published with the
    /// telemetry snapshot. They are informational only.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct DiagFlags: u16 {
        /// No buffer bound, or fewer than two samples
        const NO_BUFFER         = 0b0000_0001;
        /// Transport is not in the playing state
        const NOT_PLAYING       = 0b0000_0010;
        /// Active region was structurally invalid and got resynced
        const LOOP_INVALID      = 0b0000_0100;
        /// Interpolator had to clamp a read index into its region
        const INDEX_CLAMPED     = 0b0000_1000;
        /// Phase increment was exactly zero
        const ZERO_INCREMENT    = 0b0001_0000;
        /// Requested crossfade length was clamped
        const XFADE_CLAMPED     = 0b0010_0000;
        /// Through-zero FM reversed the travel direction against the mode
        const DIRECTION_FLIPPED = 0b0100_0000;
    }
}

impl DiagFlags {
    /// Flags that mean the output block was silent
    pub const SILENT: DiagFlags = DiagFlags::NO_BUFFER.union(DiagFlags::NOT_PLAYING);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_roundtrip() {
        for state in [
            TransportState::Idle,
            TransportState::Ready,
            TransportState::Playing,
            TransportState::Paused,
        ] {
            assert_eq!(TransportState::from_u8(state as u8), state);
        }
        assert_eq!(TransportState::from_u8(200), TransportState::Idle);
    }

    #[test]
    fn test_mode_names() {
        for mode in PlaybackMode::ALL {
            assert_eq!(PlaybackMode::from_name(mode.name()), Some(mode));
            assert_eq!(PlaybackMode::from_u8(mode as u8), mode);
        }
        assert_eq!(PlaybackMode::from_name("PingPong"), Some(PlaybackMode::Alternate));
        assert_eq!(PlaybackMode::from_name("sideways"), None);
    }

    #[test]
    fn test_direction_of_increment() {
        assert_eq!(Direction::of_increment(5, Direction::Reverse), Direction::Forward);
        assert_eq!(Direction::of_increment(-5, Direction::Forward), Direction::Reverse);
        assert_eq!(Direction::of_increment(0, Direction::Reverse), Direction::Reverse);
        assert_eq!(Direction::Forward.flipped().sign(), -1);
    }

    #[test]
    fn test_diag_silent_mask() {
        assert!(DiagFlags::SILENT.contains(DiagFlags::NO_BUFFER));
        assert!(DiagFlags::SILENT.contains(DiagFlags::NOT_PLAYING));
        assert!(!DiagFlags::SILENT.intersects(DiagFlags::ZERO_INCREMENT));
    }
}
