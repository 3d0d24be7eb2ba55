use anyhow::{Context, Result};
use std::path::PathBuf;

/// Centralized path management for content-engine
/// This module provides a single source of truth for all application paths

const APP_DIR: &str = "content-engine";

/// Get the main config directory
pub fn engine_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join(APP_DIR);

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

pub fn engine_config_file() -> Result<PathBuf> {
    Ok(engine_config_dir()?.join("config.toml"))
}

/// Default root for produced scripts, audio, subtitles and videos
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
            home.join(".local/share")
        })
        .join(APP_DIR)
        .join("output")
}

/// Default pre-seeded background pool
pub fn default_assets_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
        .join("backgrounds")
}

/// Default root for the stock clip cache and render scratch files
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
}
