use std::time::Duration;

use mmwave_transport::{ByteSource, SerialSource, TransportError};

/// Opens the links a session talks over.
pub trait Connector: Send + Sync {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn ByteSource>, TransportError>;
}

/// Opens operating-system serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn ByteSource>, TransportError> {
        Ok(Box::new(SerialSource::open(port, baud_rate, timeout)?))
    }
}
