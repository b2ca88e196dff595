mod config;
pub mod database;
pub mod migrations;
pub mod store;

pub use config::{AdherenceConfig, Config, DaemonConfig, LoggingConfig, RemindersConfig};
pub use database::{DataResetOptions, DataResetSummary, MedicationDb};
pub use store::MedicationStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `MEDALARM_DATA_DIR` wins when set. Otherwise `~/.config/medalarm[-dev]/`
/// based on MEDALARM_ENV; set MEDALARM_ENV=dev to use the development
/// directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("MEDALARM_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("MEDALARM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("medalarm-dev")
            } else {
                base_dir.join("medalarm")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
