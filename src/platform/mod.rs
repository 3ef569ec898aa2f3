// Platform paths for bookmark-sync.
//
// Linux follows XDG (`$XDG_CONFIG_HOME`, `$XDG_DATA_HOME`), macOS uses
// `~/Library/Application Support`, Windows uses `%APPDATA%`.

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "bookmark-sync";

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

#[cfg(target_os = "windows")]
fn app_data_dir() -> PathBuf {
    env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
        .join(APP_DIR)
}

/// Directory holding `settings.json`.
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join(APP_DIR)
    }
    #[cfg(target_os = "windows")]
    {
        app_data_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join(APP_DIR),
            Err(_) => home_dir().join(".config").join(APP_DIR),
        }
    }
}

/// Directory holding the local bookmark database.
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join(APP_DIR)
    }
    #[cfg(target_os = "windows")]
    {
        app_data_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_DATA_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join(APP_DIR),
            Err(_) => home_dir().join(".local").join("share").join(APP_DIR),
        }
    }
}
