//! Player configuration
//!
//! Stored as YAML in the looper config directory
//! (`~/.config/looper/player.yaml` on Linux).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use looper_core::config::EngineConfig;

/// Config file name inside the looper config directory
pub const CONFIG_FILE: &str = "player.yaml";

/// Top-level player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub engine: EngineConfig,
    pub audio: AudioSettings,
    pub controls: ControlSettings,
}

/// Output device selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Device name as listed by `looper-player devices`; `None` = default
    pub device: Option<String>,
    /// Fixed device buffer in frames; `None` lets the driver choose
    pub buffer_frames: Option<u32>,
}

/// Smoothing applied to console controls before the engine sees them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// EMA shift per tick (higher = slower glide)
    pub smoothing_shift: u8,
    /// Median-of-3 spike rejection ahead of the EMA
    pub median3: bool,
    /// Control smoothing rate in Hz
    pub tick_hz: u32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            smoothing_shift: 4,
            median3: true,
            tick_hz: 1000,
        }
    }
}

/// Default location of the player config file
pub fn default_config_path() -> PathBuf {
    looper_core::config::default_config_path(CONFIG_FILE)
}
