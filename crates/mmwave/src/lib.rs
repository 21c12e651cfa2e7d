//! Decoder and session driver for mmWave radar sensors.
//!
//! The sensor exposes two serial links: a command port that accepts a
//! line-oriented configuration script, and a data port that streams
//! binary frames of detection data.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-source abstraction over serial ports and captures
//! - [`frame`]: Frame/TLV decoding, the reference encoder and mount geometry
//! - [`session`]: Sensor lifecycle and frame acquisition (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use mmwave_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mmwave_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use mmwave_session::*;
}
