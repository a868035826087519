//! # FoamSender Communication
//!
//! Serial transport for the foam cutter: port enumeration, the
//! write-then-drain line protocol, file streaming, and an in-process
//! simulator of the controller firmware.

pub mod serial;
pub mod simulator;
pub mod streamer;
pub mod transport;

pub use serial::{
    list_ports, PortSettings, RealSerialPort, SerialBackend, SerialPort, SerialPortInfo,
    SystemBackend, DEFAULT_BAUD_RATE,
};
pub use simulator::{MachineState, SimulatorBackend, SIMULATOR_PORT};
pub use streamer::{stream_file, StreamOptions, StreamSummary};
pub use transport::{SendOutcome, TransportConfig, TransportController};
