//! Platform-specific paths for configuration files.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/ruta/` (Linux), `~/Library/Application Support/ruta/` (macOS), `%APPDATA%\ruta\` (Windows)
//! - **System config**: `/etc/ruta/` (Linux), `/Library/Application Support/ruta/` (macOS)
//!
//! # Example
//!
//! ```rust,no_run
//! use ruta_config::paths;
//!
//! if let Some(path) = paths::find_config(None) {
//!     println!("Using config at: {:?}", path);
//! }
//! ```

use std::path::PathBuf;

use crate::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "ruta";

/// File name looked up in the config directories.
pub const CONFIG_FILE_NAME: &str = "ruta.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the system-wide configuration directory.
pub fn system_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc").join(APP_NAME)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support").join(APP_NAME)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
    }
}

/// Find a config file.
///
/// With an explicit name, returns it if it is a file, otherwise looks for
/// `<name>` and `<name>.toml` in the user then system directories. Without
/// a name, looks for [`CONFIG_FILE_NAME`] in the user then system
/// directories.
pub fn find_config(name: Option<&str>) -> Option<PathBuf> {
    let filename = match name {
        Some(name) => {
            let path = PathBuf::from(name);
            if path.is_file() {
                return Some(path);
            }
            if name.ends_with(".toml") {
                name.to_string()
            } else {
                format!("{name}.toml")
            }
        }
        None => CONFIG_FILE_NAME.to_string(),
    };

    [user_config_dir(), system_config_dir()]
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|path| path.is_file())
}

/// Ensure the user config directory exists, creating it if necessary.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}
