//! Engine tuning parameters

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{DEFAULT_BLOCK_SIZE, DEFAULT_OUTPUT_RATE, MIN_LOOP_LEN};

/// Largest block the engine is expected to render in one call
pub const MAX_BLOCK_SIZE: usize = 8192;

/// How through-zero FM interacts with a running crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeFmPolicy {
    /// The increment captured when the session starts drives both cursors
    /// for the whole session. FM resumes once the session completes.
    #[default]
    Locked,
    /// Both cursors follow the same per-sample modulated increment, so FM
    /// can reverse direction mid-session.
    Shared,
}

/// Which resonant filter runs on the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// 8-pole ladder band-pass (4 LP + 4 HP one-pole stages)
    #[default]
    Ladder,
    /// 2-pole TPT state-variable band-pass with gain compensation
    StateVariable,
}

/// Engine configuration
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples rendered per block by the platform layer
    pub block_size: usize,
    /// Output sample rate in Hz
    pub output_sample_rate: u32,
    /// Shortest loop the region controls can select
    pub min_loop_len: usize,
    /// Shortest crossfade in samples (reduced for tiny regions)
    pub min_xfade: usize,
    /// Samples after a crossfade during which no new one may start
    pub cooldown_samples: usize,
    /// Magnitude limit on the playback ratio
    pub max_rate: f64,
    /// One-pole coefficient for the FM modulator (1.0 = no smoothing)
    pub fm_smoothing: f32,
    pub fm_policy: CrossfadeFmPolicy,
    pub filter: FilterKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            output_sample_rate: DEFAULT_OUTPUT_RATE,
            min_loop_len: MIN_LOOP_LEN,
            min_xfade: 8,
            cooldown_samples: DEFAULT_BLOCK_SIZE,
            max_rate: 16.0,
            fm_smoothing: 0.05,
            fm_policy: CrossfadeFmPolicy::Locked,
            filter: FilterKind::Ladder,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.output_sample_rate == 0 {
            return Err(EngineError::ZeroSampleRate("output"));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "block_size {} outside 1..={}",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }
        if self.min_loop_len < 2 {
            return Err(EngineError::InvalidConfig(format!(
                "min_loop_len {} must be at least 2",
                self.min_loop_len
            )));
        }
        if self.min_xfade == 0 {
            return Err(EngineError::InvalidConfig(
                "min_xfade must be at least 1".to_string(),
            ));
        }
        if !(self.max_rate.is_finite() && self.max_rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "max_rate {} must be positive",
                self.max_rate
            )));
        }
        if !(self.fm_smoothing > 0.0 && self.fm_smoothing <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "fm_smoothing {} outside (0, 1]",
                self.fm_smoothing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_rate = EngineConfig {
            output_sample_rate: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            zero_rate.validate(),
            Err(EngineError::ZeroSampleRate("output"))
        );

        let huge_block = EngineConfig {
            block_size: MAX_BLOCK_SIZE + 1,
            ..EngineConfig::default()
        };
        assert!(huge_block.validate().is_err());

        let bad_smoothing = EngineConfig {
            fm_smoothing: 0.0,
            ..EngineConfig::default()
        };
        assert!(bad_smoothing.validate().is_err());

        let bad_rate = EngineConfig {
            max_rate: f64::INFINITY,
            ..EngineConfig::default()
        };
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn test_policy_yaml_names() {
        let yaml = serde_yaml::to_string(&CrossfadeFmPolicy::Shared).unwrap();
        assert_eq!(yaml.trim(), "shared");
        let kind: FilterKind = serde_yaml::from_str("state_variable").unwrap();
        assert_eq!(kind, FilterKind::StateVariable);
    }
}
