/// Errors that can occur on a sensor serial link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The requested baud rate cannot be used.
    #[error("invalid baud rate: {0}")]
    InvalidBaudRate(u32),

    /// No serial device exists under the given name.
    #[error("{port} is an invalid serial port")]
    NotFound { port: String },

    /// The process is not allowed to open the device.
    #[error("permission denied opening {port}")]
    PermissionDenied { port: String },

    /// Opening the port failed for another reason.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// Error reported by the serial driver on an open port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// Whether the link is gone and further reads or writes are pointless.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Closed => true,
            TransportError::Io(err) => !matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            TransportError::Serial(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
