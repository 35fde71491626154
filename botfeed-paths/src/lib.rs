//! XDG Base Directory paths for botfeed.
//!
//! The CLI uses XDG paths on every platform, not platform-native ones, so
//! config lives in the same place on Linux and macOS.

use std::path::PathBuf;

/// File name of the user and project configuration files.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the botfeed config directory.
///
/// Returns `$XDG_CONFIG_HOME/botfeed` if set, otherwise `~/.config/botfeed`.
///
/// # Examples
///
/// ```
/// use botfeed_paths::config_dir;
///
/// let config = config_dir();
/// assert!(config.ends_with("botfeed"));
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("botfeed")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/botfeed")
    } else {
        PathBuf::from(".config/botfeed")
    }
}

/// Path of the user-level config file.
pub fn user_config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}
