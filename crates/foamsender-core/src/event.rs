//! Event system between the shell and its frontends
//!
//! Provides:
//! - Event types for connection, port list, transfer and status changes
//! - Event dispatcher for publishing events to subscribers

use crate::status::StatusMessage;
use std::path::PathBuf;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Receiving end of an [`EventDispatcher`] subscription
pub type EventReceiver = broadcast::Receiver<SenderEvent>;

/// Sender event types
#[derive(Debug, Clone, PartialEq)]
pub enum SenderEvent {
    /// Port list was refreshed
    PortsRefreshed(Vec<String>),
    /// A port became the current selection
    PortSelected(String),
    /// Connection opened
    Connected(String),
    /// Connection closed
    Disconnected,
    /// A G-code file was selected
    FileSelected(PathBuf),
    /// A file transfer started
    TransferStarted(PathBuf),
    /// One line was written and acknowledged
    LineSent {
        /// 1-based line number in the source file.
        line_number: usize,
        /// The line as transmitted, without terminator.
        line: String,
    },
    /// Progress through the file in bytes
    Progress {
        /// Bytes consumed from the file so far.
        bytes_read: u64,
        /// Total file size in bytes.
        total_bytes: u64,
    },
    /// The transfer finished successfully
    TransferFinished {
        /// Number of lines transmitted.
        lines_sent: usize,
    },
    /// The transfer stopped before the end of the file
    TransferFailed {
        /// Number of lines transmitted before the failure.
        lines_sent: usize,
        /// Description of the failure.
        reason: String,
    },
    /// Jog step size changed
    StepSizeChanged(f64),
    /// Status line changed
    StatusChanged(StatusMessage),
}

impl std::fmt::Display for SenderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderEvent::PortsRefreshed(ports) => {
                if ports.is_empty() {
                    write!(f, "No ports available")
                } else {
                    write!(f, "Ports: {}", ports.join(", "))
                }
            }
            SenderEvent::PortSelected(port) => write!(f, "Selected port {}", port),
            SenderEvent::Connected(port) => write!(f, "Connected to {}", port),
            SenderEvent::Disconnected => write!(f, "Disconnected"),
            SenderEvent::FileSelected(path) => write!(f, "Selected file {}", path.display()),
            SenderEvent::TransferStarted(path) => write!(f, "Sending {}", path.display()),
            SenderEvent::LineSent { line_number, line } => {
                write!(f, "> {} (line {})", line, line_number)
            }
            SenderEvent::Progress {
                bytes_read,
                total_bytes,
            } => write!(f, "Progress: {}/{} bytes", bytes_read, total_bytes),
            SenderEvent::TransferFinished { lines_sent } => {
                write!(f, "Transfer finished: {} lines", lines_sent)
            }
            SenderEvent::TransferFailed { lines_sent, reason } => {
                write!(f, "Transfer stopped after {} lines: {}", lines_sent, reason)
            }
            SenderEvent::StepSizeChanged(step) => write!(f, "Step size: {} mm", step),
            SenderEvent::StatusChanged(status) => write!(f, "{}", status),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for sender events.
    tx: broadcast::Sender<SenderEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 256)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Publishing with no subscriber is not an error; the event is dropped.
    pub fn publish(&self, event: SenderEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!("No subscribers for event: {}", event);
                0
            }
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
