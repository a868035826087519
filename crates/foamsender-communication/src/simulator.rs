//! In-process simulator of the foam cutter firmware
//!
//! Behaves like the controller on the other end of the serial line:
//! it understands `G0`, `G90` and `G91`, tracks the position of the four
//! axes in whole motor steps, and prints `ok` (without a line terminator)
//! when a command completes.
//!
//! Like the firmware, a `G0` whose longest axis moves zero steps never
//! completes and therefore never answers. Blank and unknown lines are
//! ignored silently.

use crate::serial::{PortSettings, SerialBackend, SerialPort, SerialPortInfo};
use foamsender_core::{ConnectionError, Result, ABSOLUTE_MODE, RAPID_MOVE, RELATIVE_MODE};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name under which the simulator is listed
pub const SIMULATOR_PORT: &str = "simulator";

/// Millimetres per motor step, horizontal axes (X, A)
pub const MM_PER_STEP_H: f64 = 0.0015625;

/// Millimetres per motor step, vertical axes (Y, Z)
pub const MM_PER_STEP_V: f64 = 0.0015625;

/// Reply sent when a command completes
pub const RESPONSE_OK: &[u8] = b"ok";

/// Simulated machine state
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    /// `true` after G90 (the power-on default), `false` after G91
    pub absolute_mode: bool,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    /// Completed G0 moves
    pub moves: usize,
    /// Every complete line received, terminator stripped
    pub received: Vec<String>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            absolute_mode: true,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            a: 0.0,
            moves: 0,
            received: Vec::new(),
        }
    }
}

/// Value following the first occurrence of `letter` in `parameters`,
/// parsed the way C's `atof` does, or `default` when the letter is absent.
pub fn parameter_value(parameters: &str, letter: char, default: f64) -> f64 {
    match parameters.find(letter) {
        Some(idx) => parse_float_prefix(&parameters[idx + letter.len_utf8()..]),
        None => default,
    }
}

/// Parse the longest numeric prefix of `s`; 0.0 when there is none.
fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Whole steps needed to cover `delta` millimetres, truncated toward zero
fn steps_for(delta: f64, mm_per_step: f64) -> u64 {
    (delta.abs() / mm_per_step) as u64
}

fn advance(position: f64, delta: f64, steps: u64, mm_per_step: f64) -> f64 {
    let travel = steps as f64 * mm_per_step;
    if delta > 0.0 {
        position + travel
    } else {
        position - travel
    }
}

impl MachineState {
    /// Execute one line and return the reply, if any
    pub fn execute(&mut self, line: &str) -> Option<&'static [u8]> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.received.push(line.to_string());

        let (command, parameters) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest),
            None => (line, ""),
        };

        match command {
            RAPID_MOVE | "G00" => self.rapid_move(parameters),
            ABSOLUTE_MODE => {
                self.absolute_mode = true;
                Some(RESPONSE_OK)
            }
            RELATIVE_MODE => {
                self.absolute_mode = false;
                Some(RESPONSE_OK)
            }
            other => {
                tracing::debug!("Simulator ignoring unknown command {}", other);
                None
            }
        }
    }

    fn rapid_move(&mut self, parameters: &str) -> Option<&'static [u8]> {
        let base = |pos: f64| if self.absolute_mode { pos } else { 0.0 };

        let dx = parameter_value(parameters, 'X', base(self.x)) - base(self.x);
        let dy = parameter_value(parameters, 'Y', base(self.y)) - base(self.y);
        let da = parameter_value(parameters, 'A', base(self.a)) - base(self.a);
        let dz = parameter_value(parameters, 'Z', base(self.z)) - base(self.z);

        let sx = steps_for(dx, MM_PER_STEP_H);
        let sy = steps_for(dy, MM_PER_STEP_V);
        let sa = steps_for(da, MM_PER_STEP_H);
        let sz = steps_for(dz, MM_PER_STEP_V);

        if sx.max(sy).max(sa).max(sz) == 0 {
            tracing::debug!("Simulator received a zero-length move; no reply");
            return None;
        }

        self.x = advance(self.x, dx, sx, MM_PER_STEP_H);
        self.y = advance(self.y, dy, sy, MM_PER_STEP_V);
        self.a = advance(self.a, da, sa, MM_PER_STEP_H);
        self.z = advance(self.z, dz, sz, MM_PER_STEP_V);
        self.moves += 1;
        Some(RESPONSE_OK)
    }
}

/// A port connected to the simulated firmware
pub struct SimulatedPort {
    name: String,
    state: Arc<Mutex<MachineState>>,
    in_use: Arc<AtomicBool>,
    pending: Vec<u8>,
    inbound: VecDeque<u8>,
}

impl SerialPort for SimulatedPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                if let Some(reply) = self.state.lock().execute(&line) {
                    self.inbound.extend(reply);
                }
            } else {
                self.pending.push(byte);
            }
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
        &self.name
    }
}

impl Drop for SimulatedPort {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}

/// Backend exposing a single simulated port
#[derive(Clone, Default)]
pub struct SimulatorBackend {
    state: Arc<Mutex<MachineState>>,
    in_use: Arc<AtomicBool>,
}

impl SimulatorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the simulated machine
    pub fn state(&self) -> MachineState {
        self.state.lock().clone()
    }
}

impl SerialBackend for SimulatorBackend {
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(vec![SerialPortInfo::new(
            SIMULATOR_PORT,
            "Simulated foam cutter",
        )])
    }

    fn open(&self, port: &str, _settings: &PortSettings) -> Result<Box<dyn SerialPort>> {
        if port != SIMULATOR_PORT {
            return Err(ConnectionError::PortNotFound {
                port: port.to_string(),
            }
            .into());
        }
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(ConnectionError::PortInUse {
                port: port.to_string(),
            }
            .into());
        }

        Ok(Box::new(SimulatedPort {
            name: port.to_string(),
            state: self.state.clone(),
            in_use: self.in_use.clone(),
            pending: Vec::new(),
            inbound: VecDeque::new(),
        }))
    }
}
