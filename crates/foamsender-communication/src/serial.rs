//! Serial port communication implementation
//!
//! Provides low-level serial port operations for direct hardware connection
//! to the foam cutter via USB.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Fixed 8-N-1 line settings at a configurable baud rate
//! - Input buffer inspection for acknowledgment draining

use foamsender_core::{ConnectionError, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Baud rate the firmware listens at
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Label for port pickers: "<name> (<description>)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.port_name, self.description)
    }
}

/// Line settings used when opening a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout applied to blocking reads
    pub read_timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write all bytes to the port
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read available bytes into `buf`
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Get the port name
    fn name(&self) -> &str;
}

/// Source of serial ports: the operating system or a simulator
pub trait SerialBackend: Send + Sync {
    /// Enumerate ports that can be opened
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Open a port with the given line settings
    fn open(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn SerialPort>>;
}

/// List available serial ports on the system
///
/// Every port the operating system enumerates is returned. USB-serial
/// clones show up under many names (`ttyUSB`, `cu.wchusbserial`,
/// `cu.SLAB_USBtoUART`, `COM`), so no name filter is applied.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports.iter().map(port_info).collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::Enumeration {
                reason: e.to_string(),
            }
            .into())
        }
    }
}

/// Convert an enumerated port into a port descriptor
pub fn port_info(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            info
        }
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Translate an open failure into the connection error taxonomy
fn open_error(port: &str, e: serialport::Error) -> ConnectionError {
    let busy = e.description.to_ascii_lowercase().contains("busy");
    match e.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            ConnectionError::PortNotFound {
                port: port.to_string(),
            }
        }
        _ if busy => ConnectionError::PortInUse {
            port: port.to_string(),
        },
        serialport::ErrorKind::InvalidInput => ConnectionError::InvalidParameters {
            reason: e.description,
        },
        _ => ConnectionError::FailedToOpen {
            port: port.to_string(),
            reason: e.description,
        },
    }
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    /// Open a serial port at 8-N-1 with the given settings
    pub fn open(port: &str, settings: &PortSettings) -> Result<Self> {
        if settings.baud_rate == 0 {
            return Err(ConnectionError::InvalidParameters {
                reason: "baud rate must be > 0".to_string(),
            }
            .into());
        }

        let builder = serialport::new(port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(handle) => Ok(RealSerialPort {
                name: port.to_string(),
                port: handle,
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                Err(open_error(port, e).into())
            }
        }
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Backend for ports provided by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend;

impl SerialBackend for SystemBackend {
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        list_ports()
    }

    fn open(&self, port: &str, settings: &PortSettings) -> Result<Box<dyn SerialPort>> {
        Ok(Box::new(RealSerialPort::open(port, settings)?))
    }
}
