use bytes::{Buf, BufMut};

use crate::error::{DecodeError, Result};
use crate::types::{FrameHeader, Version};

/// Synchronization marker: words 0x0102 0x0304 0x0506 0x0708, little-endian.
pub const MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Frame header: nine little-endian u32 fields = 36 bytes.
pub const HEADER_SIZE: usize = 36;

/// Marker plus header; the smallest legal `total_packet_len`.
pub const PREAMBLE_SIZE: usize = MAGIC.len() + HEADER_SIZE;

/// TLV record header: type (4) + length (4).
pub const TLV_HEADER_SIZE: usize = 8;

/// Default upper bound on `total_packet_len`: 64 KiB.
pub const DEFAULT_MAX_PACKET_LEN: usize = 64 * 1024;

/// Decode the 36 header bytes that follow the marker.
///
/// Header layout (all u32 LE):
/// ```text
/// ┌─────────┬───────────┬──────────┬─────────┬──────────┬─────────┬──────────┬──────────┬────────────┐
/// │ version │ total_len │ platform │ frame # │ cpu time │ num obj │ num tlvs │ subframe │ num static │
/// └─────────┴───────────┴──────────┴─────────┴──────────┴─────────┴──────────┴──────────┴────────────┘
/// ```
pub fn decode_header(mut src: &[u8]) -> Result<FrameHeader> {
    if src.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated {
            context: "frame header",
            expected: HEADER_SIZE,
            actual: src.len(),
        });
    }

    Ok(FrameHeader {
        version: Version::from_word(src.get_u32_le()),
        total_packet_len: src.get_u32_le(),
        platform: src.get_u32_le(),
        frame_number: src.get_u32_le(),
        time_cpu_cycles: src.get_u32_le(),
        num_detected_obj: src.get_u32_le(),
        num_tlvs: src.get_u32_le(),
        subframe_number: src.get_u32_le(),
        num_static_detected_obj: src.get_u32_le(),
    })
}

/// Append the 36-byte wire form of `header`.
pub fn encode_header(header: &FrameHeader, dst: &mut impl BufMut) {
    dst.put_u32_le(header.version.to_word());
    dst.put_u32_le(header.total_packet_len);
    dst.put_u32_le(header.platform);
    dst.put_u32_le(header.frame_number);
    dst.put_u32_le(header.time_cpu_cycles);
    dst.put_u32_le(header.num_detected_obj);
    dst.put_u32_le(header.num_tlvs);
    dst.put_u32_le(header.subframe_number);
    dst.put_u32_le(header.num_static_detected_obj);
}

/// Bytes available for TLV records after the preamble, or a fault when the
/// declared length is outside `[PREAMBLE_SIZE, max_packet_len]`.
pub(crate) fn tlv_budget(header: &FrameHeader, max_packet_len: usize) -> Result<usize> {
    let total = header.total_packet_len as usize;
    if total < PREAMBLE_SIZE {
        return Err(DecodeError::PacketTooShort {
            total_packet_len: header.total_packet_len,
        });
    }
    if total > max_packet_len {
        return Err(DecodeError::PacketTooLarge {
            total_packet_len: header.total_packet_len,
            max: max_packet_len,
        });
    }
    Ok(total - PREAMBLE_SIZE)
}
