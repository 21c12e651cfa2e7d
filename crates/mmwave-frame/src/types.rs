use serde::{Deserialize, Serialize};

/// Target id of a dynamic point before any association record is seen.
pub const UNASSOCIATED: u8 = 255;

/// Firmware version packed into the first header word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub bugfix: u8,
    pub build: u8,
}

impl Version {
    /// Unpack `major << 24 | minor << 16 | bugfix << 8 | build`.
    pub fn from_word(word: u32) -> Self {
        Self {
            major: (word >> 24) as u8,
            minor: (word >> 16) as u8,
            bugfix: (word >> 8) as u8,
            build: word as u8,
        }
    }

    /// Pack back into the wire word.
    pub fn to_word(self) -> u32 {
        u32::from(self.major) << 24
            | u32::from(self.minor) << 16
            | u32::from(self.bugfix) << 8
            | u32::from(self.build)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.bugfix, self.build
        )
    }
}

/// The fixed 36-byte header that follows the synchronization marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: Version,
    /// Packet length in bytes, marker and header included.
    pub total_packet_len: u32,
    pub platform: u32,
    /// Per-sensor frame counter; may wrap.
    pub frame_number: u32,
    pub time_cpu_cycles: u32,
    pub num_detected_obj: u32,
    pub num_tlvs: u32,
    pub subframe_number: u32,
    pub num_static_detected_obj: u32,
}

/// Point cloud entry for a moving reflection, in spherical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicPoint {
    /// Track id (< 250) or the reason the point was not associated.
    pub target_id: u8,
    pub range: f32,
    pub angle: f32,
    pub elev: f32,
    pub doppler: f32,
    pub snr: u16,
    pub noise: u16,
}

impl DynamicPoint {
    /// Interpret the target id.
    pub fn association(&self) -> Association {
        Association::from(self.target_id)
    }
}

/// Point cloud entry for a static reflection, in cartesian coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub doppler: f32,
    pub snr: u16,
    pub noise: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A target reported by the on-chip tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub target_id: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
}

/// Meaning of a dynamic point's target id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    /// Associated with the tracked object of this id.
    Track(u8),
    /// Ids 250..=252 carry no documented meaning.
    Reserved(u8),
    /// Not associated: below the SNR threshold.
    BelowSnr,
    /// Not associated: outside the boundary box.
    OutsideBoundary,
    /// Not associated: considered noise.
    Noise,
}

impl From<u8> for Association {
    fn from(id: u8) -> Self {
        match id {
            0..=249 => Association::Track(id),
            253 => Association::BelowSnr,
            254 => Association::OutsideBoundary,
            255 => Association::Noise,
            other => Association::Reserved(other),
        }
    }
}

/// One decoded frame of detection data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub header: FrameHeader,
    pub dynamic_points: Vec<DynamicPoint>,
    pub static_points: Vec<StaticPoint>,
    pub tracked_objects: Vec<TrackedObject>,
}

impl Frame {
    /// Create an empty frame for the given header.
    pub fn new(header: FrameHeader) -> Self {
        Self {
            header,
            ..Self::default()
        }
    }
}
