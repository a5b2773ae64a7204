use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// User config directory (`$XDG_CONFIG_HOME`, falling back to `~/.config`).
pub fn user_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("HOME environment variable not set".to_string())
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

/// Chitin toolkit config file path
pub fn chitin_config() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("chitin").join("config.json"))
}
