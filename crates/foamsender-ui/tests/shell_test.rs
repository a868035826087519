use foamsender_communication::{
    PortSettings, SerialBackend, SerialPort, SerialPortInfo, SimulatorBackend, TransportConfig,
    TransportController, SIMULATOR_PORT,
};
use foamsender_core::{
    Axis, ConnectionError, EventDispatcher, EventReceiver, JogDirection, MessageLevel,
    SenderEvent, StatusMessage,
};
use foamsender_ui::{spawn_worker, Shell, ShellCommand, ShellOptions, ShellState};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Device that acknowledges every line with "ok" and records what it got
struct AckPort {
    inbound: VecDeque<u8>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl SerialPort for AckPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(data);
        for _ in data.iter().filter(|b| **b == b'\n') {
            self.inbound.extend(b"ok");
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.inbound.len() as u32)
    }

    fn name(&self) -> &str {
        "/dev/ttyACK0"
    }
}

struct AckBackend {
    ports: Vec<&'static str>,
    written: Arc<Mutex<Vec<u8>>>,
    listing_fails: Arc<AtomicBool>,
}

impl AckBackend {
    fn new(ports: Vec<&'static str>) -> Self {
        Self {
            ports,
            written: Arc::new(Mutex::new(Vec::new())),
            listing_fails: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SerialBackend for AckBackend {
    fn list_ports(&self) -> foamsender_core::Result<Vec<SerialPortInfo>> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(ConnectionError::Enumeration {
                reason: "device tree unavailable".to_string(),
            }
            .into());
        }
        Ok(self
            .ports
            .iter()
            .map(|name| SerialPortInfo::new(*name, "Acknowledging port"))
            .collect())
    }

    fn open(
        &self,
        _port: &str,
        _settings: &PortSettings,
    ) -> foamsender_core::Result<Box<dyn SerialPort>> {
        Ok(Box::new(AckPort {
            inbound: VecDeque::new(),
            written: self.written.clone(),
        }))
    }
}

fn fast_config() -> TransportConfig {
    TransportConfig {
        ack_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        ..TransportConfig::default()
    }
}

fn shell_with(backend: Arc<dyn SerialBackend>, options: ShellOptions) -> Shell {
    shell_with_config(backend, options, fast_config())
}

fn shell_with_config(
    backend: Arc<dyn SerialBackend>,
    options: ShellOptions,
    config: TransportConfig,
) -> Shell {
    let transport = TransportController::new(backend, config);
    Shell::new(
        Arc::new(parking_lot::Mutex::new(transport)),
        EventDispatcher::default(),
        options,
    )
}

fn drain_events(rx: &mut EventReceiver) -> Vec<SenderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn connected_simulator(step: f64) -> (Shell, SimulatorBackend) {
    let sim = SimulatorBackend::new();
    let options = ShellOptions {
        step_size: step,
        ..ShellOptions::default()
    };
    let mut shell = shell_with(Arc::new(sim.clone()), options);
    shell.dispatch(ShellCommand::RefreshPorts);
    assert_eq!(shell.selected_port(), Some(SIMULATOR_PORT));
    let status = shell.dispatch(ShellCommand::OpenPort).unwrap();
    assert_eq!(status.level, MessageLevel::Info);
    assert_eq!(shell.state(), ShellState::Connected);
    (shell, sim)
}

#[test]
fn test_jog_negative_x_sends_relative_move() {
    let (mut shell, sim) = connected_simulator(5.0);

    let status = shell
        .dispatch(ShellCommand::Jog {
            axis: Axis::X,
            direction: JogDirection::Negative,
        })
        .unwrap();

    assert!(!status.is_error(), "{}", status);
    let state = sim.state();
    assert_eq!(state.received, vec!["G91", "G0 X-5"]);
    assert!(!state.absolute_mode);
    assert!((state.x + 5.0).abs() < 1e-9);
}

#[test]
fn test_jog_positive_z_with_fractional_step() {
    let (mut shell, sim) = connected_simulator(1.0);
    shell.dispatch(ShellCommand::SetStepSize(2.5));
    assert_eq!(shell.step_size(), 2.5);

    shell.dispatch(ShellCommand::Jog {
        axis: Axis::Z,
        direction: JogDirection::Positive,
    });

    assert_eq!(sim.state().received, vec!["G91", "G0 Z2.5"]);
}

#[test]
fn test_jog_requires_connection() {
    let backend = Arc::new(AckBackend::new(vec!["/dev/ttyUSB0"]));
    let mut shell = shell_with(backend.clone(), ShellOptions::default());

    let status = shell
        .dispatch(ShellCommand::Jog {
            axis: Axis::A,
            direction: JogDirection::Positive,
        })
        .unwrap();

    assert_eq!(status, StatusMessage::error("Port is not open."));
    assert!(backend.written.lock().unwrap().is_empty());
}

#[test]
fn test_send_file_without_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    std::fs::write(&path, "G90\nG0 X10\n").unwrap();

    let backend = Arc::new(AckBackend::new(vec!["/dev/ttyUSB0"]));
    let mut shell = shell_with(backend.clone(), ShellOptions::default());
    shell.dispatch(ShellCommand::SelectFile(Some(path)));

    let status = shell.dispatch(ShellCommand::SendFile).unwrap();
    assert_eq!(status, StatusMessage::error("Port is not open."));
    assert!(backend.written.lock().unwrap().is_empty());
}

#[test]
fn test_send_nonexistent_file_writes_nothing() {
    let backend = Arc::new(AckBackend::new(vec!["/dev/ttyUSB0"]));
    let mut shell = shell_with(backend.clone(), ShellOptions::default());
    shell.dispatch(ShellCommand::RefreshPorts);
    shell.dispatch(ShellCommand::OpenPort);

    let missing = PathBuf::from("/nonexistent/foam/cut.gcode");
    shell.dispatch(ShellCommand::SelectFile(Some(missing.clone())));
    let status = shell.dispatch(ShellCommand::SendFile).unwrap();

    assert_eq!(
        status,
        StatusMessage::error(format!("Error opening the file {}.", missing.display()))
    );
    assert_eq!(shell.status(), Some(&status));
    assert!(backend.written.lock().unwrap().is_empty());
    assert_eq!(shell.state(), ShellState::Connected);
}

#[test]
fn test_send_file_streams_every_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "G90\r\nG0 X10 Y5\n\nG0 A2 Z2\n").unwrap();

    let backend = Arc::new(AckBackend::new(vec!["/dev/ttyUSB0"]));
    let mut shell = shell_with(backend.clone(), ShellOptions::default());
    let mut rx = shell.events().subscribe();
    shell.dispatch(ShellCommand::RefreshPorts);
    shell.dispatch(ShellCommand::OpenPort);
    shell.dispatch(ShellCommand::SelectFile(Some(path.clone())));

    let status = shell.dispatch(ShellCommand::SendFile).unwrap();

    assert_eq!(status, StatusMessage::info("Sent 3 lines."));
    let written = String::from_utf8(backend.written.lock().unwrap().clone()).unwrap();
    assert_eq!(written, "G90\nG0 X10 Y5\nG0 A2 Z2\n");

    let events = drain_events(&mut rx);
    assert!(events.contains(&SenderEvent::TransferStarted(path)));
    assert!(events.contains(&SenderEvent::TransferFinished { lines_sent: 3 }));
    assert_eq!(
        events.last(),
        Some(&SenderEvent::StatusChanged(status.clone()))
    );
}

#[test]
fn test_failed_line_reports_send_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    // The zero-length move is never acknowledged by the firmware.
    std::fs::write(&path, "G90\nG0 X0\nG0 X10\n").unwrap();

    let (mut shell, sim) = connected_simulator(1.0);
    shell.dispatch(ShellCommand::SelectFile(Some(path)));
    let status = shell.dispatch(ShellCommand::SendFile).unwrap();

    assert_eq!(status, StatusMessage::error("Error sending bytes."));
    assert_eq!(sim.state().received, vec!["G90", "G0 X0"]);
}

#[test]
fn test_cancelled_transfer_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    std::fs::write(&path, "G0 X0\nG0 X10\n").unwrap();

    let sim = SimulatorBackend::new();
    let config = TransportConfig {
        ack_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(1),
        ..TransportConfig::default()
    };
    let mut shell = shell_with_config(Arc::new(sim.clone()), ShellOptions::default(), config);
    shell.dispatch(ShellCommand::RefreshPorts);
    shell.dispatch(ShellCommand::OpenPort);
    shell.dispatch(ShellCommand::SelectFile(Some(path)));

    // The simulator stays silent on the zero-length move, so only the
    // cancel can end the wait.
    let cancel = shell.cancel_handle();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });
    let started = Instant::now();
    let status = shell.dispatch(ShellCommand::SendFile).unwrap();
    canceller.join().unwrap();

    assert_eq!(status, StatusMessage::warning("Transfer cancelled."));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sim.state().received, vec!["G0 X0"]);
    assert_eq!(shell.state(), ShellState::Connected);
}

#[test]
fn test_refresh_failure_clears_port_list() {
    let backend = AckBackend::new(vec!["/dev/ttyUSB0"]);
    let listing_fails = backend.listing_fails.clone();
    let mut shell = shell_with(Arc::new(backend), ShellOptions::default());
    let mut rx = shell.events().subscribe();

    shell.dispatch(ShellCommand::RefreshPorts);
    assert_eq!(shell.ports().len(), 1);
    drain_events(&mut rx);

    listing_fails.store(true, Ordering::SeqCst);
    let status = shell.dispatch(ShellCommand::RefreshPorts).unwrap();

    assert!(status.is_error());
    assert!(shell.ports().is_empty());
    let events = drain_events(&mut rx);
    assert_eq!(events[0], SenderEvent::PortsRefreshed(Vec::new()));
}

#[test]
fn test_refresh_with_no_ports() {
    let backend = Arc::new(AckBackend::new(Vec::new()));
    let mut shell = shell_with(backend, ShellOptions::default());
    let mut rx = shell.events().subscribe();

    let status = shell.dispatch(ShellCommand::RefreshPorts).unwrap();

    assert!(!status.is_error());
    assert!(shell.ports().is_empty());
    assert_eq!(shell.selected_port(), None);
    assert_eq!(shell.state(), ShellState::Idle);
    let events = drain_events(&mut rx);
    assert_eq!(events[0], SenderEvent::PortsRefreshed(Vec::new()));
}

#[test]
fn test_refresh_keeps_present_selection_and_replaces_vanished_one() {
    let backend = Arc::new(AckBackend::new(vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]));
    let mut shell = shell_with(backend, ShellOptions::default());

    shell.dispatch(ShellCommand::SelectPort("/dev/ttyUSB1".to_string()));
    shell.dispatch(ShellCommand::RefreshPorts);
    assert_eq!(shell.selected_port(), Some("/dev/ttyUSB1"));

    shell.dispatch(ShellCommand::SelectPort("/dev/ttyGONE".to_string()));
    shell.dispatch(ShellCommand::RefreshPorts);
    assert_eq!(shell.selected_port(), Some("/dev/ttyUSB0"));
    assert_eq!(shell.state(), ShellState::PortSelected);
}

#[test]
fn test_open_without_selection() {
    let backend = Arc::new(AckBackend::new(Vec::new()));
    let mut shell = shell_with(backend, ShellOptions::default());

    let status = shell.dispatch(ShellCommand::OpenPort).unwrap();
    assert_eq!(status, StatusMessage::error("No port selected."));
}

#[test]
fn test_close_transitions_to_disconnected() {
    let (mut shell, _sim) = connected_simulator(1.0);

    let status = shell.dispatch(ShellCommand::ClosePort).unwrap();
    assert_eq!(status, StatusMessage::info("Port closed."));
    assert_eq!(shell.state(), ShellState::Disconnected);

    let status = shell.dispatch(ShellCommand::ClosePort).unwrap();
    assert_eq!(status.level, MessageLevel::Warning);
}

#[test]
fn test_dismissed_file_dialog_changes_nothing() {
    let backend = Arc::new(AckBackend::new(Vec::new()));
    let mut shell = shell_with(backend, ShellOptions::default());

    assert_eq!(shell.dispatch(ShellCommand::SelectFile(None)), None);
    assert_eq!(shell.selected_file(), None);
    assert_eq!(shell.status(), None);
}

#[test]
fn test_invalid_step_sizes_are_rejected() {
    let backend = Arc::new(AckBackend::new(Vec::new()));
    let mut shell = shell_with(backend, ShellOptions::default());

    for step in [0.0, -1.0, f64::NAN, 1000.0] {
        let status = shell.dispatch(ShellCommand::SetStepSize(step)).unwrap();
        assert!(status.is_error(), "step {} accepted", step);
    }
    assert_eq!(shell.step_size(), 1.0);
}

#[test]
fn test_worker_thread_processes_commands() {
    let sim = SimulatorBackend::new();
    let options = ShellOptions {
        step_size: 2.0,
        ..ShellOptions::default()
    };
    let shell = shell_with(Arc::new(sim.clone()), options);
    let mut rx = shell.events().subscribe();

    let (commands, worker) = spawn_worker(shell).unwrap();
    assert!(commands.post(ShellCommand::RefreshPorts));
    assert!(commands.post(ShellCommand::OpenPort));
    assert!(commands.post(ShellCommand::Jog {
        axis: Axis::Y,
        direction: JogDirection::Positive,
    }));
    drop(commands);
    worker.join().unwrap();

    assert_eq!(sim.state().received, vec!["G91", "G0 Y2"]);
    let events = drain_events(&mut rx);
    assert!(events.contains(&SenderEvent::Connected(SIMULATOR_PORT.to_string())));
}

fn last_status(events: &[SenderEvent]) -> Option<&StatusMessage> {
    events.iter().rev().find_map(|event| match event {
        SenderEvent::StatusChanged(status) => Some(status),
        _ => None,
    })
}

#[test]
fn test_cancel_reaches_a_queued_send() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    std::fs::write(&path, "G90\nG0 X10\n").unwrap();

    let sim = SimulatorBackend::new();
    let shell = shell_with(Arc::new(sim.clone()), ShellOptions::default());
    let transport = shell.transport().clone();
    let mut rx = shell.events().subscribe();

    // Holding the transport keeps the worker busy on the first command
    // while the rest queue up behind it.
    let guard = transport.lock();
    let (commands, worker) = spawn_worker(shell).unwrap();
    commands.post(ShellCommand::RefreshPorts);
    commands.post(ShellCommand::OpenPort);
    commands.post(ShellCommand::SelectFile(Some(path)));
    commands.post(ShellCommand::SendFile);
    commands.cancel();
    drop(guard);
    drop(commands);
    worker.join().unwrap();

    assert!(sim.state().received.is_empty());
    let events = drain_events(&mut rx);
    assert!(events.contains(&SenderEvent::Connected(SIMULATOR_PORT.to_string())));
    assert_eq!(
        last_status(&events),
        Some(&StatusMessage::warning("Transfer cancelled."))
    );
}

#[test]
fn test_send_posted_after_cancel_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.gcode");
    std::fs::write(&path, "G90\n").unwrap();

    let sim = SimulatorBackend::new();
    let shell = shell_with(Arc::new(sim.clone()), ShellOptions::default());
    let mut rx = shell.events().subscribe();

    let (commands, worker) = spawn_worker(shell).unwrap();
    commands.cancel();
    commands.post(ShellCommand::RefreshPorts);
    commands.post(ShellCommand::OpenPort);
    commands.post(ShellCommand::SelectFile(Some(path)));
    commands.post(ShellCommand::SendFile);
    drop(commands);
    worker.join().unwrap();

    assert_eq!(sim.state().received, vec!["G90"]);
    let events = drain_events(&mut rx);
    assert_eq!(last_status(&events), Some(&StatusMessage::info("Sent 1 lines.")));
}
