//! Error handling for FoamSender
//!
//! Provides error types for each layer of the application:
//! - Connection errors (opening, closing and owning the serial port)
//! - Transmission errors (writing a line and draining the acknowledgment)
//! - Shell errors (preconditions of operator commands)
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the lifecycle of the serial connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Port is held by another process
    #[error("Port already in use: {port}")]
    PortInUse {
        /// The name of the port that is in use.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// A connection is already open
    #[error("Port {port} is already open")]
    AlreadyOpen {
        /// The port currently held by the controller.
        port: String,
    },

    /// No connection is open
    #[error("Port is not open")]
    NotConnected,

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Transmission error type
///
/// Raised while a single line is written and its acknowledgment drained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmissionError {
    /// Writing the line failed
    #[error("Failed to write '{line}': {reason}")]
    WriteFailed {
        /// The line being written, without terminator.
        line: String,
        /// The underlying I/O failure.
        reason: String,
    },

    /// Reading the acknowledgment failed
    #[error("Failed to read acknowledgment: {reason}")]
    ReadFailed {
        /// The underlying I/O failure.
        reason: String,
    },

    /// The device did not answer in time
    #[error("No acknowledgment for '{line}' after {timeout_ms}ms")]
    AckTimeout {
        /// The line that was not acknowledged.
        line: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The transfer was cancelled by the operator
    #[error("Transfer cancelled")]
    Cancelled,
}

/// Shell error type
///
/// Violated preconditions of operator commands.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShellError {
    /// No port has been selected
    #[error("No port selected")]
    NoPortSelected,

    /// No file has been selected
    #[error("No file selected")]
    NoFileSelected,

    /// The selected file could not be opened
    #[error("Error opening the file {}: {reason}", path.display())]
    FileOpen {
        /// The file that could not be opened.
        path: PathBuf,
        /// The reason it could not be opened.
        reason: String,
    },

    /// Jog step is not a positive finite number
    #[error("Invalid step size: {value}")]
    InvalidStepSize {
        /// The rejected step size.
        value: f64,
    },
}

/// Main error type for FoamSender
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Transmission error
    #[error(transparent)]
    Transmission(#[from] TransmissionError),

    /// Shell error
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an acknowledgment timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transmission(TransmissionError::AckTimeout { .. }))
    }

    /// Check if the operator cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Transmission(TransmissionError::Cancelled))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a transmission error
    pub fn is_transmission_error(&self) -> bool {
        matches!(self, Error::Transmission(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
