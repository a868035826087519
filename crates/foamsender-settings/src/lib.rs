//! FoamSender Settings Crate
//!
//! Reads the startup configuration.

pub mod config;
pub mod error;

pub use config::{
    BackendKind, Config, ConnectionSettings, FileProcessingSettings, MachineSettings,
    CONFIG_PATH_ENV,
};
pub use error::{SettingsError, SettingsResult};
