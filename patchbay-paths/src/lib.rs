//! XDG Base Directory paths for patchbay.
//!
//! The registry stores its provider list under XDG paths for
//! cross-platform consistency, not platform-native paths. This matches
//! tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the patchbay config directory.
///
/// Returns `$XDG_CONFIG_HOME/patchbay` if set, otherwise `~/.config/patchbay`.
/// This is where the provider registry blob lives.
///
/// # Examples
///
/// ```
/// use patchbay_paths::config_dir;
///
/// let config = config_dir();
/// let providers = config.join("providers.json");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("patchbay")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/patchbay")
    } else {
        PathBuf::from(".config/patchbay")
    }
}

/// Get the patchbay data directory.
///
/// Returns `$XDG_DATA_HOME/patchbay` if set, otherwise `~/.local/share/patchbay`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("patchbay")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/patchbay")
    } else {
        PathBuf::from(".local/share/patchbay")
    }
}
