//! Default config locations

use std::path::PathBuf;

/// Directory name under the platform config dir
const APP_DIR: &str = "looper";

/// Platform config directory for looper (`~/.config/looper` on Linux).
///
/// Falls back to the working directory when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Path of a named config file inside [`default_config_dir`]
pub fn default_config_path(file_name: &str) -> PathBuf {
    default_config_dir().join(file_name)
}
