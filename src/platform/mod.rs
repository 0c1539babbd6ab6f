// Tabs Aside platform paths
// Config and data directories for the options file and the bookmark database.
//
// Uses `cfg(target_os)` for conditional compilation to select the correct
// platform convention at compile time.

use std::env;
use std::path::PathBuf;

#[cfg_attr(target_os = "windows", allow(dead_code))]
fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Returns the platform-specific configuration directory for Tabs Aside.
///
/// - **Linux**: `$XDG_CONFIG_HOME/tabs-aside` or `~/.config/tabs-aside`
/// - **macOS**: `~/Library/Application Support/tabs-aside`
/// - **Windows**: `%APPDATA%/tabs-aside`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA")
            .unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming"));
        PathBuf::from(appdata).join("tabs-aside")
    }
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join("tabs-aside")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("tabs-aside"),
            Err(_) => home_dir().join(".config").join("tabs-aside"),
        }
    }
}

/// Returns the platform-specific data directory for Tabs Aside.
///
/// - **Linux**: `$XDG_DATA_HOME/tabs-aside` or `~/.local/share/tabs-aside`
/// - **macOS** and **Windows**: same as the config directory
pub fn get_data_dir() -> PathBuf {
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        get_config_dir()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        match env::var("XDG_DATA_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("tabs-aside"),
            Err(_) => home_dir().join(".local").join("share").join("tabs-aside"),
        }
    }
}
