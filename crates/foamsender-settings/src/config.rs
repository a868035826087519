//! Configuration for FoamSender
//!
//! Settings are read once at startup from a JSON or TOML file stored in the
//! platform config directory. Nothing is written back; every field has a
//! default, so a missing file or a partial file is fine.
//!
//! Configuration is organized into sections:
//! - Connection settings (default port, baud rate, acknowledgment timing)
//! - Machine preferences (jog step and its bounds)
//! - File processing (blank line handling)

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "FOAMSENDER_CONFIG";

/// Where serial ports come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ports enumerated by the operating system
    #[default]
    Serial,
    /// The built-in firmware simulator
    Simulator,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Simulator => write!(f, "simulator"),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port selected at startup if present
    pub port: Option<String>,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Time to wait for the first acknowledgment byte
    pub ack_timeout_ms: u64,
    /// Sleep between input buffer polls
    pub poll_interval_ms: u64,
    /// Quiet time required before draining stops
    pub settle_ms: u64,
    /// Port source
    pub backend: BackendKind,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            ack_timeout_ms: 10_000,
            poll_interval_ms: 1,
            settle_ms: 0,
            backend: BackendKind::Serial,
        }
    }
}

impl ConnectionSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Machine preference settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Jog step in mm at startup
    pub jog_step_mm: f64,
    /// Smallest step the jog panel allows
    pub jog_step_min: f64,
    /// Largest step the jog panel allows
    pub jog_step_max: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            jog_step_mm: 1.0,
            jog_step_min: 0.01,
            jog_step_max: 100.0,
        }
    }
}

/// File processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProcessingSettings {
    /// Skip lines that are empty once their terminator is removed
    pub skip_blank_lines: bool,
}

impl Default for FileProcessingSettings {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Machine preferences
    pub machine: MachineSettings,
    /// File processing settings
    pub file_processing: FileProcessingSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load the config file if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            tracing::info!("Loading settings from {}", path.display());
            Self::load_from_file(path)
        } else {
            tracing::info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Location of the config file: `$FOAMSENDER_CONFIG`, else
    /// `<config dir>/foamsender/config.toml`
    pub fn config_file_path() -> SettingsResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        dirs::config_dir()
            .map(|dir| dir.join("foamsender").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config directory on this platform".to_string())
            })
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let conn = &self.connection;
        if conn.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if conn.ack_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.ack_timeout_ms",
                "must be > 0",
            ));
        }
        if conn.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.poll_interval_ms",
                "must be > 0",
            ));
        }
        if conn.poll_interval_ms > conn.ack_timeout_ms {
            return Err(SettingsError::invalid(
                "connection.poll_interval_ms",
                "must not exceed ack_timeout_ms",
            ));
        }

        let machine = &self.machine;
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(machine.jog_step_min) || !positive(machine.jog_step_max) {
            return Err(SettingsError::invalid(
                "machine.jog_step_min",
                "step bounds must be positive",
            ));
        }
        if machine.jog_step_min > machine.jog_step_max {
            return Err(SettingsError::invalid(
                "machine.jog_step_min",
                "must not exceed jog_step_max",
            ));
        }
        if !(machine.jog_step_min..=machine.jog_step_max).contains(&machine.jog_step_mm) {
            return Err(SettingsError::invalid(
                "machine.jog_step_mm",
                format!(
                    "must lie within {}..={}",
                    machine.jog_step_min, machine.jog_step_max
                ),
            ));
        }

        Ok(())
    }
}
