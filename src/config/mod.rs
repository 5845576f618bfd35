//! Configuration module for linescan-capture
//!
//! The configuration is an immutable value assembled once at startup:
//! defaults, optionally overlaid by a TOML file, optionally overlaid by the
//! acquisition overrides given on the command line.
//!
//! # Config File Location
//!
//! When no path is given explicitly, the file is looked up in the
//! platform-appropriate config directory under `linescan-capture`:
//!
//! - **Linux**: `~/.config/linescan-capture/config.toml`
//! - **macOS**: `~/Library/Application Support/linescan-capture/config.toml`
//! - **Windows**: `%APPDATA%\linescan-capture\config.toml`
//!
//! # Example
//!
//! ```toml
//! [acquisition]
//! server_name = "Linea_M4096-7um_1"
//! resource_index = 0
//!
//! [network]
//! listen_addr = "0.0.0.0:1234"
//!
//! [persistence]
//! poll_interval_ms = 500
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "linescan-capture";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera selection
    pub acquisition: AcquisitionParams,
    /// MCU link
    pub network: NetworkConfig,
    /// MCU log
    pub persistence: PersistenceConfig,
    /// Frame files
    pub frames: FrameConfig,
    /// Output location
    pub output: OutputConfig,
    /// Failure policy
    pub policy: PolicyConfig,
    /// Logging
    pub logging: LoggingConfig,
    /// Simulated grabber
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Load the explicit path if given, else the default location if it
    /// exists, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {:?}", path);
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CaptureError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            CaptureError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check values that would stall or break the pipelines
    pub fn validate(&self) -> Result<()> {
        if self.acquisition.server_name.trim().is_empty() {
            return Err(CaptureError::Config(
                "acquisition.server_name must not be empty".to_string(),
            ));
        }
        if self.persistence.poll_interval_ms == 0 {
            return Err(CaptureError::Config(
                "persistence.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.persistence.log_file_name.trim().is_empty() {
            return Err(CaptureError::Config(
                "persistence.log_file_name must not be empty".to_string(),
            ));
        }
        if self.network.read_chunk_bytes == 0 {
            return Err(CaptureError::Config(
                "network.read_chunk_bytes must be greater than zero".to_string(),
            ));
        }
        if self.network.max_line_bytes == 0 {
            return Err(CaptureError::Config(
                "network.max_line_bytes must be greater than zero".to_string(),
            ));
        }
        if !(self.simulation.frame_rate_hz.is_finite() && self.simulation.frame_rate_hz > 0.0) {
            return Err(CaptureError::Config(
                "simulation.frame_rate_hz must be a positive number".to_string(),
            ));
        }
        if self.simulation.buffer_count == 0 {
            return Err(CaptureError::Config(
                "simulation.buffer_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Tests ====================
