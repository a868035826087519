//! # FoamSender
//!
//! Streams G-code files to a four-axis foam cutter over a serial line and
//! jogs its X, Y, Z and A axes by hand.
//!
//! ## Architecture
//!
//! FoamSender is organized as a workspace with multiple crates:
//!
//! 1. **foamsender-core** - Errors, axis and jog model, status messages, events
//! 2. **foamsender-communication** - Serial transport, firmware simulator, file streaming
//! 3. **foamsender-settings** - Startup configuration
//! 4. **foamsender-ui** - Operator shell and the optional GTK window
//! 5. **foamsender** - Main binary with the console frontend

pub mod console;

pub use foamsender_communication::{
    list_ports, SerialPortInfo, SimulatorBackend, StreamOptions, TransportConfig,
    TransportController, SIMULATOR_PORT,
};
pub use foamsender_core::{
    Axis, CancellationToken, ConnectionError, Error, EventDispatcher, JogDirection, MessageLevel,
    Result, SenderEvent, ShellError, StatusMessage, TransmissionError,
};
pub use foamsender_settings::{BackendKind, Config, SettingsError};
pub use foamsender_ui::{Shell, ShellCommand, ShellState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Process exit status for a frontend's exit code
///
/// Codes outside `0..=255` collapse to the generic failure status 1.
pub fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Pretty output on stderr, keeping stdout for the console frontend
/// - RUST_LOG environment variable support
/// - Targets, thread ids and line numbers
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
