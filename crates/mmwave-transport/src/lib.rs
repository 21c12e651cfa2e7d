//! Byte-source abstraction over the serial links of an mmWave radar sensor.
//!
//! A sensor exposes two serial links:
//! - a low-rate configuration link (text commands and replies)
//! - a high-rate data link (binary frames)
//!
//! This is the lowest layer of mmwave. Everything else talks to the links
//! through the [`ByteSource`] trait, so decoding and session logic can run
//! against [`MemorySource`] without hardware attached.

mod buffer;
pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemorySource;
pub use serial::{list_ports, PortInfo, SerialSource};
pub use traits::ByteSource;
