use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::buffer::ReadBuffer;
use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

/// A sensor link backed by an operating-system serial port.
///
/// Opened 8N1 without flow control. The timeout bounds every blocking read;
/// a read that times out returns the bytes received so far.
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    name: String,
    baud_rate: u32,
    buf: ReadBuffer,
}

impl SerialSource {
    /// Open `port` at `baud_rate` with the given read/write timeout.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        if baud_rate == 0 {
            return Err(TransportError::InvalidBaudRate(baud_rate));
        }

        let handle = serialport::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|err| open_error(port, baud_rate, err))?;

        info!(port, baud_rate, "opened serial port");

        Ok(Self {
            port: handle,
            name: port.to_string(),
            baud_rate,
            buf: ReadBuffer::new(),
        })
    }
}

impl ByteSource for SerialSource {
    fn read(&mut self, n: usize) -> Result<Bytes> {
        self.buf.read(&mut *self.port, n)
    }

    fn read_until(&mut self, delimiter: &[u8]) -> Result<Bytes> {
        self.buf.read_until(&mut *self.port, delimiter)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.buf.clear();
        self.port.clear(ClearBuffer::All)?;
        debug!(port = %self.name, "cleared serial buffers");
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if baud_rate == 0 {
            return Err(TransportError::InvalidBaudRate(baud_rate));
        }
        self.port.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        debug!(port = %self.name, baud_rate, "changed baud rate");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

/// A serial port visible to the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path or COM name.
    pub name: String,
    /// Short description of the port type (`usb`, `pci`, `bluetooth`, `unknown`).
    pub kind: String,
    /// USB product string, when reported.
    pub product: Option<String>,
}

/// Enumerate serial ports present on this machine.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product) = match port.port_type {
                SerialPortType::UsbPort(info) => ("usb", info.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind: kind.to_string(),
                product,
            }
        })
        .collect())
}

fn open_error(port: &str, baud_rate: u32, err: serialport::Error) -> TransportError {
    match err.kind() {
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => TransportError::NotFound {
            port: port.to_string(),
        },
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied {
                port: port.to_string(),
            }
        }
        serialport::ErrorKind::InvalidInput if err.description.contains("baud") => {
            TransportError::InvalidBaudRate(baud_rate)
        }
        _ => TransportError::Open {
            port: port.to_string(),
            source: err,
        },
    }
}
