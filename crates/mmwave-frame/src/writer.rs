use std::io::{self, ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::codec::{encode_header, MAGIC, PREAMBLE_SIZE};
use crate::error::{DecodeError, Result};
use crate::tlv::TlvRecord;
use crate::types::FrameHeader;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Encode a frame the way the sensor emits it.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┬──────────────────────────────┐
/// │ Marker (8B)  │ Header (36B)     │ num_tlvs × (type, len, data) │
/// └──────────────┴──────────────────┴──────────────────────────────┘
/// ```
///
/// `total_packet_len` and `num_tlvs` are computed from `records`; every
/// other header field is taken from `header` as given.
pub fn encode_frame(header: &FrameHeader, records: &[TlvRecord], dst: &mut BytesMut) -> Result<()> {
    let total = PREAMBLE_SIZE + records.iter().map(TlvRecord::wire_size).sum::<usize>();
    let total_packet_len = u32::try_from(total).map_err(|_| DecodeError::PacketTooLarge {
        total_packet_len: u32::MAX,
        max: u32::MAX as usize,
    })?;

    let header = FrameHeader {
        total_packet_len,
        num_tlvs: records.len() as u32,
        ..*header
    };

    dst.reserve(total);
    dst.put_slice(&MAGIC);
    encode_header(&header, dst);
    for record in records {
        record.encode(dst);
    }
    Ok(())
}

/// Writes encoded frames to any `Write` sink, e.g. a capture file.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write one frame, returning the bytes written.
    pub fn write_frame(&mut self, header: &FrameHeader, records: &[TlvRecord]) -> io::Result<usize> {
        self.buf.clear();
        encode_frame(header, records, &mut self.buf)
            .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err.to_string()))?;

        self.inner.write_all(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Write raw bytes between frames (noise, padding).
    pub fn write_raw(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
