//! Configuration shared by looper applications
//!
//! - Generic YAML config loading/saving
//! - Default config locations
//! - Engine tuning parameters
//!
//! ```ignore
//! use looper_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
//! config.validate()?;
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{CrossfadeFmPolicy, EngineConfig, FilterKind, MAX_BLOCK_SIZE};
pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
