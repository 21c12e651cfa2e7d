//! Lifecycle management for an mmWave radar sensor.
//!
//! A [`SensorSession`] owns the two serial links of one sensor. It sends
//! the `.cfg` command script over the command port (retrying, and swapping
//! the ports when they turn out to be wired the other way round), runs the
//! acquisition loop on the data port, and hands the newest decoded frame to
//! the consumer through a single-slot channel.

pub mod config;
pub mod connector;
pub mod error;
pub mod handshake;
pub mod rate;
pub mod session;
pub mod slot;

pub use config::{
    ConfigLines, SessionConfig, DEFAULT_CONFIG_BAUD, DEFAULT_DATA_BAUD, DEFAULT_POLL_INTERVAL,
    DEFAULT_TIMEOUT,
};
pub use connector::{Connector, SerialConnector};
pub use error::{Result, SessionError};
pub use handshake::{HandshakeReport, VALID_REPLIES};
pub use rate::RateEstimator;
pub use session::{SensorSession, SessionState, MODEL};
pub use slot::FrameSlot;
