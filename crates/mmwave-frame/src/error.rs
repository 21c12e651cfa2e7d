use mmwave_transport::TransportError;

/// Errors that can occur while decoding one frame.
///
/// Everything except a fatal transport error means "drop this frame and
/// resynchronize on the next marker".
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The link delivered fewer bytes than the frame requires.
    #[error("truncated {context}: expected {expected} bytes, got {actual}")]
    Truncated {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The declared packet length cannot even hold the marker and header.
    #[error("declared packet length {total_packet_len} is shorter than the frame header")]
    PacketTooShort { total_packet_len: u32 },

    /// The declared packet length exceeds the decoder limit.
    #[error("declared packet length {total_packet_len} exceeds limit {max}")]
    PacketTooLarge { total_packet_len: u32, max: usize },

    /// A TLV record would read past the declared packet length.
    #[error("TLV #{tlv_index} needs {length} bytes but only {remaining} remain in the packet")]
    LengthOverrun {
        tlv_index: usize,
        length: usize,
        remaining: usize,
    },

    /// A TLV payload is not a whole number of entries.
    #[error("TLV type {tlv_type} payload of {length} bytes is not a multiple of {entry_size}")]
    MisalignedPayload {
        tlv_type: u32,
        length: usize,
        entry_size: usize,
    },

    /// An augmenting TLV arrived before the TLV that introduces its points.
    #[error("TLV type {tlv_type} arrived before its point list")]
    MissingPrimary { tlv_type: u32 },

    /// An augmenting TLV references more points than were decoded.
    #[error("TLV type {tlv_type} has {entries} entries but only {available} points exist")]
    IndexOutOfRange {
        tlv_type: u32,
        entries: usize,
        available: usize,
    },

    /// The underlying link failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DecodeError {
    /// Whether the acquisition loop may discard the frame and carry on.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DecodeError::Transport(err) => !err.is_fatal(),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
