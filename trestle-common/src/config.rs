//! Configuration loading and data directory resolution

use std::path::PathBuf;

use crate::{Error, Result};

/// Name of the SQLite database file inside the data directory
pub const DB_FILE_NAME: &str = "trestle.db";

/// Resolve the application data directory, in priority order:
/// 1. Explicit argument from the embedding application (highest priority)
/// 2. `TRESTLE_DATA` environment variable
/// 3. `data_dir` key in the TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_dir(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("TRESTLE_DATA") {
        return Ok(PathBuf::from(path));
    }

    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_dir) = config.get("data_dir").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(data_dir));
                }
            }
        }
    }

    Ok(default_data_dir())
}

/// Path of the durable store database inside a data directory
pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DB_FILE_NAME)
}

/// Locate the platform config file (`<config dir>/trestle/config.toml`)
fn find_config_file() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("trestle").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("trestle"))
        .unwrap_or_else(|| PathBuf::from("./trestle_data"))
}
