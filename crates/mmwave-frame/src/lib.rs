//! Frame and TLV decoding for the mmWave radar data link.
//!
//! Every frame on the data link is laid out as:
//! - an 8-byte synchronization marker ([`MAGIC`])
//! - a 36-byte header of nine little-endian `u32` fields
//! - `num_tlvs` type-length-value records
//!
//! The decoder turns one frame into a [`Frame`]; the reader resynchronizes
//! on the marker after every frame, good or bad.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod reader;
pub mod tlv;
pub mod types;
pub mod writer;

pub use codec::{
    decode_header, encode_header, DEFAULT_MAX_PACKET_LEN, HEADER_SIZE, MAGIC, PREAMBLE_SIZE,
};
pub use decoder::{DecoderConfig, FrameDecoder};
pub use error::{DecodeError, Result};
pub use geometry::Mount;
pub use reader::{sync, FrameReader};
pub use tlv::{CartesianPoint, SideInfo, SphericalPoint, TlvRecord};
pub use types::{
    Association, DynamicPoint, Frame, FrameHeader, StaticPoint, TrackedObject, Vec3, Version,
};
pub use writer::{encode_frame, FrameWriter};
