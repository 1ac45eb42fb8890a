//! Configuration: database connection, energy tables and the mission catalog.
//!
//! Built-in defaults are used unless `MISSION_CONFIG` names a TOML file, in which
//! case any `[energy]` or `[catalog]` section it contains replaces the default.

/// Database configuration and connection management
pub mod database;

/// Mission catalog and connection requirements
pub mod catalog;

/// Tier limits and mission costs
pub mod energy;

use crate::errors::{Error, Result};
use catalog::MissionCatalog;
use energy::EnergyTables;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Application configuration loaded at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Tier limits and mission costs
    #[serde(default)]
    pub energy: EnergyTables,
    /// Mission templates and requirement table
    #[serde(default)]
    pub catalog: MissionCatalog,
}

impl AppConfig {
    /// Validates both tables.
    pub fn validate(&self) -> Result<()> {
        self.energy.validate()?;
        self.catalog.validate()
    }
}

/// Loads and validates configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid, or the
/// resulting tables fail validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {}", path_ref.display());
    let contents = std::fs::read_to_string(path_ref).inspect_err(|e| {
        warn!("Failed to read config file {}: {e}", path_ref.display());
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `MISSION_CONFIG` if set, otherwise the built-in defaults.
pub fn load_app_configuration() -> Result<AppConfig> {
    if let Ok(path) = std::env::var("MISSION_CONFIG") {
        let config = load_config(&path)?;
        info!("Loaded mission configuration from {path}");
        return Ok(config);
    }

    let config = AppConfig::default();
    config.validate()?;
    info!("Using built-in mission configuration");
    Ok(config)
}
