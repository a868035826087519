//! Operator shell
//!
//! The shell is the single owner of the operator-visible state: the port
//! list, the selected port and file, the jog step and the status line.
//! Frontends never touch the transport; they push [`ShellCommand`]s and
//! render the [`SenderEvent`]s the shell publishes in return.

use foamsender_communication::{
    stream_file, SerialBackend, SerialPortInfo, SimulatorBackend, StreamOptions, SystemBackend,
    TransportConfig, TransportController,
};
use foamsender_core::{
    jog_commands, validate_step, Axis, CancellationToken, ConnectionError, Error, EventDispatcher,
    JogDirection, Result, SenderEvent, ShellError, StatusMessage, TransmissionError,
};
use foamsender_settings::{BackendKind, Config};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Commands a frontend can issue
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// A file was picked; `None` when the dialog was dismissed
    SelectFile(Option<PathBuf>),
    /// Re-enumerate serial ports
    RefreshPorts,
    /// Make a port the current selection
    SelectPort(String),
    /// Stream the selected file
    SendFile,
    /// Open the selected port
    OpenPort,
    /// Close the open port
    ClosePort,
    /// Move one axis by the current step
    Jog {
        axis: Axis,
        direction: JogDirection,
    },
    /// Change the jog step
    SetStepSize(f64),
}

/// Where the shell is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Idle,
    PortSelected,
    Connected,
    Sending,
    Disconnected,
}

/// Startup values for a [`Shell`]
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub step_size: f64,
    pub step_min: f64,
    pub step_max: f64,
    pub stream: StreamOptions,
    pub default_port: Option<String>,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            step_size: 1.0,
            step_min: 0.01,
            step_max: 100.0,
            stream: StreamOptions::default(),
            default_port: None,
        }
    }
}

impl From<&Config> for ShellOptions {
    fn from(config: &Config) -> Self {
        Self {
            step_size: config.machine.jog_step_mm,
            step_min: config.machine.jog_step_min,
            step_max: config.machine.jog_step_max,
            stream: StreamOptions {
                skip_blank_lines: config.file_processing.skip_blank_lines,
            },
            default_port: config.connection.port.clone(),
        }
    }
}

/// Transport timing taken from the connection settings
pub fn transport_config(config: &Config) -> TransportConfig {
    let conn = &config.connection;
    let mut transport = TransportConfig::default();
    transport.port_settings.baud_rate = conn.baud_rate;
    transport.ack_timeout = conn.ack_timeout();
    transport.poll_interval = conn.poll_interval();
    transport.settle = conn.settle();
    transport
}

/// Port source for the configured backend kind
pub fn backend_for(kind: BackendKind) -> Arc<dyn SerialBackend> {
    match kind {
        BackendKind::Serial => Arc::new(SystemBackend),
        BackendKind::Simulator => Arc::new(SimulatorBackend::new()),
    }
}

pub struct Shell {
    transport: Arc<Mutex<TransportController>>,
    events: EventDispatcher,
    cancel: CancellationToken,
    options: ShellOptions,
    state: ShellState,
    ports: Vec<SerialPortInfo>,
    selected_port: Option<String>,
    selected_file: Option<PathBuf>,
    step_size: f64,
    status: Option<StatusMessage>,
}

impl Shell {
    pub fn new(
        transport: Arc<Mutex<TransportController>>,
        events: EventDispatcher,
        options: ShellOptions,
    ) -> Self {
        let selected_port = options.default_port.clone();
        let state = if selected_port.is_some() {
            ShellState::PortSelected
        } else {
            ShellState::Idle
        };
        Self {
            transport,
            events,
            cancel: CancellationToken::new(),
            step_size: options.step_size,
            options,
            state,
            ports: Vec::new(),
            selected_port,
            selected_file: None,
            status: None,
        }
    }

    /// Build a shell with the backend and timing from `config`
    pub fn from_config(config: &Config) -> Self {
        let backend = backend_for(config.connection.backend);
        let transport = TransportController::new(backend, transport_config(config));
        Self::new(
            Arc::new(Mutex::new(transport)),
            EventDispatcher::default(),
            ShellOptions::from(config),
        )
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn ports(&self) -> &[SerialPortInfo] {
        &self.ports
    }

    pub fn selected_port(&self) -> Option<&str> {
        self.selected_port.as_deref()
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected_file.as_deref()
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn transport(&self) -> &Arc<Mutex<TransportController>> {
        &self.transport
    }

    /// Token that aborts a running transfer from another thread
    ///
    /// [`dispatch`](Self::dispatch) clears it when a `SendFile` starts, so a
    /// cancel only reaches a transfer that is already running.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute one command
    ///
    /// Returns the new status line, or `None` when the command left it
    /// unchanged. Failures never escape; they become error statuses.
    pub fn dispatch(&mut self, command: ShellCommand) -> Option<StatusMessage> {
        if command == ShellCommand::SendFile {
            self.cancel.reset();
        }
        let cancel = self.cancel.clone();
        self.execute(command, &cancel)
    }

    /// Execute one command with the transfer guarded by `cancel`
    fn execute(
        &mut self,
        command: ShellCommand,
        cancel: &CancellationToken,
    ) -> Option<StatusMessage> {
        tracing::debug!("Shell command: {:?}", command);
        let outcome = match command {
            ShellCommand::SelectFile(path) => Ok(self.select_file(path)),
            ShellCommand::RefreshPorts => self.refresh_ports().map(Some),
            ShellCommand::SelectPort(port) => Ok(Some(self.select_port(port))),
            ShellCommand::SendFile => self.send_file(cancel).map(Some),
            ShellCommand::OpenPort => self.open_port().map(Some),
            ShellCommand::ClosePort => self.close_port().map(Some),
            ShellCommand::Jog { axis, direction } => self.jog(axis, direction).map(Some),
            ShellCommand::SetStepSize(step) => self.set_step_size(step).map(Some),
        };

        let status = match outcome {
            Ok(status) => status?,
            Err(e) => {
                tracing::error!("{}", e);
                status_for_error(&e)
            }
        };

        self.status = Some(status.clone());
        self.events.publish(SenderEvent::StatusChanged(status.clone()));
        Some(status)
    }

    fn select_file(&mut self, path: Option<PathBuf>) -> Option<StatusMessage> {
        let path = path?;
        let status = StatusMessage::info(format!("File {} opened.", path.display()));
        self.events.publish(SenderEvent::FileSelected(path.clone()));
        self.selected_file = Some(path);
        Some(status)
    }

    fn refresh_ports(&mut self) -> Result<StatusMessage> {
        let ports = match self.transport.lock().list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                self.ports.clear();
                self.events.publish(SenderEvent::PortsRefreshed(Vec::new()));
                return Err(e);
            }
        };
        let names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();
        self.ports = ports;
        self.events.publish(SenderEvent::PortsRefreshed(names.clone()));

        let still_present = self
            .selected_port
            .as_ref()
            .is_some_and(|port| names.contains(port));
        if !still_present {
            self.selected_port = names.first().cloned();
        }
        if let Some(port) = &self.selected_port {
            self.events.publish(SenderEvent::PortSelected(port.clone()));
        }
        if !self.is_connected() {
            self.state = if self.selected_port.is_some() {
                ShellState::PortSelected
            } else {
                ShellState::Idle
            };
        }

        Ok(match names.len() {
            0 => StatusMessage::info("No serial ports found."),
            1 => StatusMessage::info("1 serial port found."),
            n => StatusMessage::info(format!("{} serial ports found.", n)),
        })
    }

    fn select_port(&mut self, port: String) -> StatusMessage {
        let status = StatusMessage::info(format!("Port {} selected.", port));
        self.events.publish(SenderEvent::PortSelected(port.clone()));
        self.selected_port = Some(port);
        if !self.is_connected() {
            self.state = ShellState::PortSelected;
        }
        status
    }

    fn open_port(&mut self) -> Result<StatusMessage> {
        let port = self
            .selected_port
            .clone()
            .ok_or(ShellError::NoPortSelected)?;
        self.transport.lock().open(&port)?;
        self.state = ShellState::Connected;
        self.events.publish(SenderEvent::Connected(port.clone()));
        Ok(StatusMessage::info(format!("Port {} opened.", port)))
    }

    fn close_port(&mut self) -> Result<StatusMessage> {
        if !self.transport.lock().close()? {
            return Ok(StatusMessage::warning("Port is not open."));
        }
        self.state = ShellState::Disconnected;
        self.events.publish(SenderEvent::Disconnected);
        Ok(StatusMessage::info("Port closed."))
    }

    fn send_file(&mut self, cancel: &CancellationToken) -> Result<StatusMessage> {
        self.require_connection()?;
        let path = self
            .selected_file
            .clone()
            .ok_or(ShellError::NoFileSelected)?;

        self.state = ShellState::Sending;
        let result = stream_file(
            &self.transport,
            &path,
            &self.options.stream,
            cancel,
            &self.events,
        );
        self.state = if self.transport.lock().is_open() {
            ShellState::Connected
        } else {
            ShellState::Disconnected
        };

        let summary = result?;
        Ok(StatusMessage::info(format!("Sent {} lines.", summary.lines_sent)))
    }

    fn jog(&mut self, axis: Axis, direction: JogDirection) -> Result<StatusMessage> {
        self.require_connection()?;
        let lines = jog_commands(axis, direction, self.step_size)?;
        // A jog is never aborted by a cancel meant for a file transfer.
        self.transport
            .lock()
            .send_lines(&lines, &CancellationToken::new())?;
        Ok(StatusMessage::info(format!(
            "Jogged {}{}{} mm.",
            axis, direction, self.step_size
        )))
    }

    fn set_step_size(&mut self, step: f64) -> Result<StatusMessage> {
        let step = validate_step(step)?;
        if step < self.options.step_min || step > self.options.step_max {
            return Err(ShellError::InvalidStepSize { value: step }.into());
        }
        self.step_size = step;
        self.events.publish(SenderEvent::StepSizeChanged(step));
        Ok(StatusMessage::info(format!("Step size set to {} mm.", step)))
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, ShellState::Connected | ShellState::Sending)
    }

    fn require_connection(&self) -> Result<()> {
        if self.is_connected() && self.transport.lock().is_open() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected.into())
        }
    }
}

/// Status line shown for a failed command
pub fn status_for_error(error: &Error) -> StatusMessage {
    match error {
        Error::Transmission(TransmissionError::Cancelled) => {
            StatusMessage::warning("Transfer cancelled.")
        }
        Error::Transmission(_) => StatusMessage::error("Error sending bytes."),
        Error::Connection(ConnectionError::NotConnected) => {
            StatusMessage::error("Port is not open.")
        }
        Error::Shell(ShellError::FileOpen { path, .. }) => {
            StatusMessage::error(format!("Error opening the file {}.", path.display()))
        }
        Error::Shell(ShellError::NoFileSelected) => StatusMessage::error("No file selected."),
        Error::Shell(ShellError::NoPortSelected) => StatusMessage::error("No port selected."),
        Error::Shell(ShellError::InvalidStepSize { value }) => {
            StatusMessage::error(format!("Invalid step size {}.", value))
        }
        other => StatusMessage::error(format!("{}.", other)),
    }
}

/// Frontend side of a shell running on a worker thread
///
/// Each posted command carries the transfer token it runs under. A
/// `SendFile` takes the current token, or a fresh one once the current
/// token has been cancelled, so a cancel issued while the send is still
/// queued aborts it when it starts.
#[derive(Clone)]
pub struct ShellHandle {
    commands: mpsc::Sender<(ShellCommand, CancellationToken)>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl ShellHandle {
    /// Queue a command; `false` once the worker has stopped
    pub fn post(&self, command: ShellCommand) -> bool {
        let cancel = {
            let mut current = self.cancel.lock();
            if command == ShellCommand::SendFile && current.is_cancelled() {
                *current = CancellationToken::new();
            }
            current.clone()
        };
        self.commands.send((command, cancel)).is_ok()
    }

    /// Abort the running transfer and any `SendFile` still queued
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }
}

/// Run `shell` on its own thread, fed through the returned handle
///
/// The thread exits once every handle has been dropped.
pub fn spawn_worker(mut shell: Shell) -> std::io::Result<(ShellHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel::<(ShellCommand, CancellationToken)>();
    let worker = thread::Builder::new()
        .name("shell".to_string())
        .spawn(move || {
            for (command, cancel) in rx {
                shell.execute(command, &cancel);
            }
            tracing::debug!("Shell worker stopped");
        })?;
    let handle = ShellHandle {
        commands: tx,
        cancel: Arc::new(Mutex::new(CancellationToken::new())),
    };
    Ok((handle, worker))
}
