//! Transport controller
//!
//! Owns the single serial connection and implements the only protocol the
//! firmware speaks: write one line, wait for the device to start answering,
//! then discard everything it sent back.

use crate::serial::{PortSettings, SerialBackend, SerialPort, SerialPortInfo};
use foamsender_core::{CancellationToken, ConnectionError, Result, TransmissionError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Timing and line settings for the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Line settings used when opening a port
    pub port_settings: PortSettings,
    /// How long to wait for the first acknowledgment byte
    pub ack_timeout: Duration,
    /// Sleep between input buffer polls
    pub poll_interval: Duration,
    /// How long the input must stay empty before draining stops
    pub settle: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_settings: PortSettings::default(),
            ack_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(1),
            settle: Duration::ZERO,
        }
    }
}

/// What a successful send did on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOutcome {
    /// Bytes written, terminator included
    pub written: usize,
    /// Acknowledgment bytes read and discarded
    pub discarded: usize,
}

/// Owner of the serial connection
pub struct TransportController {
    backend: Arc<dyn SerialBackend>,
    config: TransportConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl TransportController {
    /// Create a controller with no open connection
    pub fn new(backend: Arc<dyn SerialBackend>, config: TransportConfig) -> Self {
        Self {
            backend,
            config,
            port: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Enumerate ports from the backend
    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.backend.list_ports()
    }

    /// Open `port_id`
    ///
    /// Only one connection may be live; opening while connected is rejected
    /// and the existing connection is left untouched.
    pub fn open(&mut self, port_id: &str) -> Result<()> {
        if let Some(port) = &self.port {
            return Err(ConnectionError::AlreadyOpen {
                port: port.name().to_string(),
            }
            .into());
        }

        let port = self.backend.open(port_id, &self.config.port_settings)?;
        tracing::info!(
            "Opened {} at {} baud",
            port_id,
            self.config.port_settings.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    /// Close the connection
    ///
    /// Returns `false` when there was nothing to close.
    pub fn close(&mut self) -> Result<bool> {
        match self.port.take() {
            Some(port) => {
                tracing::info!("Closed {}", port.name());
                Ok(true)
            }
            None => {
                tracing::debug!("Close requested with no open port");
                Ok(false)
            }
        }
    }

    /// Whether a connection is open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Name of the open port
    pub fn port_name(&self) -> Option<&str> {
        self.port.as_ref().map(|p| p.name())
    }

    /// Send one line and wait until the device's answer has been drained
    ///
    /// Trailing line terminators on `line` are dropped; exactly one `\n` is
    /// transmitted. Waiting for the first answer byte and draining the answer
    /// are each bounded by the ack timeout and by `cancel`.
    pub fn send_line_and_drain(
        &mut self,
        line: &str,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome> {
        let config = self.config;
        let port = self.port.as_mut().ok_or(ConnectionError::NotConnected)?;

        let line = line.trim_end_matches(['\r', '\n']);
        if !line.is_ascii() {
            return Err(TransmissionError::WriteFailed {
                line: line.to_string(),
                reason: "line contains non-ASCII characters".to_string(),
            }
            .into());
        }

        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');

        port.write_all(framed.as_bytes())
            .map_err(|e| TransmissionError::WriteFailed {
                line: line.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("> {}", line);

        wait_for_answer(&**port, line, &config, cancel)?;
        let discarded = drain(&mut **port, &config, cancel)?;
        tracing::trace!("Discarded {} acknowledgment bytes", discarded);

        Ok(SendOutcome {
            written: framed.len(),
            discarded,
        })
    }

    /// Send several lines in order, stopping at the first failure
    pub fn send_lines<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        cancel: &CancellationToken,
    ) -> Result<Vec<SendOutcome>> {
        lines
            .iter()
            .map(|line| self.send_line_and_drain(line.as_ref(), cancel))
            .collect()
    }
}

fn read_failed(e: std::io::Error) -> TransmissionError {
    TransmissionError::ReadFailed {
        reason: e.to_string(),
    }
}

fn wait_for_answer(
    port: &dyn SerialPort,
    line: &str,
    config: &TransportConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let deadline = Instant::now() + config.ack_timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(TransmissionError::Cancelled.into());
        }
        if port.bytes_to_read().map_err(read_failed)? > 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            tracing::warn!("No acknowledgment for '{}'", line);
            return Err(TransmissionError::AckTimeout {
                line: line.to_string(),
                timeout_ms: config.ack_timeout.as_millis() as u64,
            }
            .into());
        }
        thread::sleep(config.poll_interval);
    }
}

fn drain(
    port: &mut dyn SerialPort,
    config: &TransportConfig,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut buf = [0u8; 64];
    let mut discarded = 0;
    let mut quiet_since: Option<Instant> = None;
    let deadline = Instant::now() + config.ack_timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(TransmissionError::Cancelled.into());
        }
        if Instant::now() >= deadline {
            tracing::warn!("Input did not settle after {} bytes", discarded);
            return Err(TransmissionError::ReadFailed {
                reason: format!(
                    "input did not settle within {}ms",
                    config.ack_timeout.as_millis()
                ),
            }
            .into());
        }

        let available = port.bytes_to_read().map_err(read_failed)? as usize;
        if available > 0 {
            let want = available.min(buf.len());
            let n = port.read(&mut buf[..want]).map_err(read_failed)?;
            if n > 0 {
                quiet_since = None;
                discarded += n;
                continue;
            }
            // Pending bytes that cannot be read yet; wait instead of spinning.
            thread::sleep(config.poll_interval);
            continue;
        }

        if config.settle.is_zero() {
            return Ok(discarded);
        }
        let since = *quiet_since.get_or_insert_with(Instant::now);
        if since.elapsed() >= config.settle {
            return Ok(discarded);
        }
        thread::sleep(config.poll_interval);
    }
}
