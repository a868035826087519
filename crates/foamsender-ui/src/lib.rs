//! # FoamSender UI
//!
//! The operator shell and its graphical frontend. The shell is headless and
//! always built; the GTK window is behind the `gtk` feature.

#[cfg(feature = "gtk")]
pub mod gtk_app;
pub mod shell;

pub use shell::{
    backend_for, spawn_worker, status_for_error, transport_config, Shell, ShellCommand,
    ShellHandle, ShellOptions, ShellState,
};

// Re-export settings for frontends that only depend on this crate
pub use foamsender_settings::{BackendKind, Config};
