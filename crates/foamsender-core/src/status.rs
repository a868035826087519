//! Status line vocabulary shown to the operator.

use std::fmt;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    /// Normal progress
    Info,
    /// Something was interrupted but nothing failed
    Warning,
    /// An operation failed
    Error,
}

impl MessageLevel {
    /// Foreground color used by frontends for this level
    pub fn color(self) -> &'static str {
        match self {
            MessageLevel::Info => "green",
            MessageLevel::Warning => "yellow",
            MessageLevel::Error => "red",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLevel::Info => write!(f, "INFO"),
            MessageLevel::Warning => write!(f, "WARN"),
            MessageLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A one-line status message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    /// Text shown in the status line
    pub text: String,
    /// Severity, mapped to a color
    pub level: MessageLevel,
}

impl StatusMessage {
    /// Create a message with an explicit level
    pub fn new(text: impl Into<String>, level: MessageLevel) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }

    /// Informational message
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, MessageLevel::Info)
    }

    /// Warning message
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, MessageLevel::Warning)
    }

    /// Error message
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, MessageLevel::Error)
    }

    /// Whether this message reports a failure
    pub fn is_error(&self) -> bool {
        self.level == MessageLevel::Error
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}
