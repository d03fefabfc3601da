mod config;
pub mod database;

pub use config::{Config, EngineConfig, LoggingConfig};
pub use database::{Database, SessionRow, Stats, StepRow};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/drillroom[-dev]/` based on DRILLROOM_ENV.
///
/// Set DRILLROOM_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DRILLROOM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("drillroom-dev")
    } else {
        base_dir.join("drillroom")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
