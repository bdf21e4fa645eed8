//! Filesystem locations for textflow's config and logs
//!
//! Resolution order for the base directory:
//! 1. `TEXTFLOW_CONFIG_DIR`, used as-is
//! 2. `$XDG_CONFIG_HOME/textflow` or `~/.config/textflow` (Unix/macOS)
//! 3. `%APPDATA%\textflow` (Windows)

use std::{env, fs, path::PathBuf};

const APP_DIR: &str = "textflow";
const DIR_OVERRIDE: &str = "TEXTFLOW_CONFIG_DIR";

pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(DIR_OVERRIDE).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    platform_config_root().map(|root| root.join(APP_DIR))
}

#[cfg(target_os = "windows")]
fn platform_config_root() -> Option<PathBuf> {
    env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(target_os = "windows"))]
fn platform_config_root() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
}

/// `<config dir>/config.yaml`
pub fn config_file() -> Option<PathBuf> {
    Some(config_dir()?.join("config.yaml"))
}

/// `<config dir>/logs`
pub fn logs_dir() -> Option<PathBuf> {
    Some(config_dir()?.join("logs"))
}

/// Create the logs directory if needed
pub fn ensure_logs_dir() -> Result<PathBuf, String> {
    let logs = logs_dir().ok_or("no home or config directory to log into")?;
    fs::create_dir_all(&logs).map_err(|e| format!("cannot create {}: {}", logs.display(), e))?;
    Ok(logs)
}
