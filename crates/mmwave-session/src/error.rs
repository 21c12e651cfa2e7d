use std::path::PathBuf;

use mmwave_frame::DecodeError;
use mmwave_transport::TransportError;

/// Errors that can occur while driving a sensor session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame decoding failed in a way that cannot be skipped.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The operation needs both the config and the data port open.
    #[error("sensor is not connected")]
    Disconnected,

    /// Acquisition was requested before a successful configuration.
    #[error("sensor configuration has not been sent")]
    ConfigNotSent,

    /// The sensor never acknowledged the configuration.
    #[error("configuration rejected after {attempts} attempt(s) (ports swapped: {swapped})")]
    HandshakeFailed { attempts: u32, swapped: bool },

    /// A configuration file could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;
