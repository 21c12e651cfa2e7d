//! TLV record kinds and their payload layouts.
//!
//! Each record on the wire is `type: u32 LE`, `length: u32 LE` and then
//! `length` payload bytes made of fixed-size entries. Records carry raw
//! sensor-frame values; the decoder applies the mount transform when it
//! folds them into a [`Frame`](crate::Frame).

use bytes::{Buf, BufMut, Bytes};

use crate::codec::TLV_HEADER_SIZE;
use crate::error::{DecodeError, Result};
use crate::types::{TrackedObject, Vec3};

pub const TLV_DYNAMIC_POINTS: u32 = 1;
pub const TLV_DYNAMIC_SIDE_INFO: u32 = 7;
pub const TLV_STATIC_POINTS: u32 = 8;
pub const TLV_STATIC_SIDE_INFO: u32 = 9;
pub const TLV_TRACKED_OBJECTS: u32 = 10;
pub const TLV_ASSOCIATION: u32 = 11;

const POINT_ENTRY_SIZE: usize = 16;
const SIDE_INFO_ENTRY_SIZE: usize = 4;
const TRACKED_OBJECT_ENTRY_SIZE: usize = 40;
const ASSOCIATION_ENTRY_SIZE: usize = 1;

/// Dynamic point as sent by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalPoint {
    pub range: f32,
    pub angle: f32,
    pub elev: f32,
    pub doppler: f32,
}

/// Static point as sent by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub doppler: f32,
}

/// Per-point signal quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideInfo {
    pub snr: u16,
    pub noise: u16,
}

/// One decoded TLV record.
#[derive(Debug, Clone, PartialEq)]
pub enum TlvRecord {
    DynamicPoints(Vec<SphericalPoint>),
    DynamicSideInfo(Vec<SideInfo>),
    StaticPoints(Vec<CartesianPoint>),
    StaticSideInfo(Vec<SideInfo>),
    TrackedObjects(Vec<TrackedObject>),
    /// Target id per dynamic point.
    Association(Vec<u8>),
    /// A type this decoder does not know; kept verbatim.
    Unknown { tlv_type: u32, payload: Bytes },
}

impl TlvRecord {
    /// Parse a payload of the given type.
    pub fn parse(tlv_type: u32, mut payload: Bytes) -> Result<Self> {
        let record = match tlv_type {
            TLV_DYNAMIC_POINTS => {
                let n = entries(tlv_type, &payload, POINT_ENTRY_SIZE)?;
                TlvRecord::DynamicPoints(
                    (0..n)
                        .map(|_| SphericalPoint {
                            range: payload.get_f32_le(),
                            angle: payload.get_f32_le(),
                            elev: payload.get_f32_le(),
                            doppler: payload.get_f32_le(),
                        })
                        .collect(),
                )
            }
            TLV_DYNAMIC_SIDE_INFO | TLV_STATIC_SIDE_INFO => {
                let n = entries(tlv_type, &payload, SIDE_INFO_ENTRY_SIZE)?;
                let info: Vec<SideInfo> = (0..n)
                    .map(|_| SideInfo {
                        snr: payload.get_u16_le(),
                        noise: payload.get_u16_le(),
                    })
                    .collect();
                if tlv_type == TLV_DYNAMIC_SIDE_INFO {
                    TlvRecord::DynamicSideInfo(info)
                } else {
                    TlvRecord::StaticSideInfo(info)
                }
            }
            TLV_STATIC_POINTS => {
                let n = entries(tlv_type, &payload, POINT_ENTRY_SIZE)?;
                TlvRecord::StaticPoints(
                    (0..n)
                        .map(|_| CartesianPoint {
                            x: payload.get_f32_le(),
                            y: payload.get_f32_le(),
                            z: payload.get_f32_le(),
                            doppler: payload.get_f32_le(),
                        })
                        .collect(),
                )
            }
            TLV_TRACKED_OBJECTS => {
                let n = entries(tlv_type, &payload, TRACKED_OBJECT_ENTRY_SIZE)?;
                TlvRecord::TrackedObjects(
                    (0..n)
                        .map(|_| TrackedObject {
                            target_id: payload.get_u32_le(),
                            position: get_vec3(&mut payload),
                            velocity: get_vec3(&mut payload),
                            acceleration: get_vec3(&mut payload),
                        })
                        .collect(),
                )
            }
            TLV_ASSOCIATION => {
                entries(tlv_type, &payload, ASSOCIATION_ENTRY_SIZE)?;
                TlvRecord::Association(payload.to_vec())
            }
            other => TlvRecord::Unknown {
                tlv_type: other,
                payload,
            },
        };
        Ok(record)
    }

    /// Wire type of this record.
    pub fn tlv_type(&self) -> u32 {
        match self {
            TlvRecord::DynamicPoints(_) => TLV_DYNAMIC_POINTS,
            TlvRecord::DynamicSideInfo(_) => TLV_DYNAMIC_SIDE_INFO,
            TlvRecord::StaticPoints(_) => TLV_STATIC_POINTS,
            TlvRecord::StaticSideInfo(_) => TLV_STATIC_SIDE_INFO,
            TlvRecord::TrackedObjects(_) => TLV_TRACKED_OBJECTS,
            TlvRecord::Association(_) => TLV_ASSOCIATION,
            TlvRecord::Unknown { tlv_type, .. } => *tlv_type,
        }
    }

    /// Payload length in bytes, excluding the TLV header.
    pub fn payload_len(&self) -> usize {
        match self {
            TlvRecord::DynamicPoints(points) => points.len() * POINT_ENTRY_SIZE,
            TlvRecord::DynamicSideInfo(info) | TlvRecord::StaticSideInfo(info) => {
                info.len() * SIDE_INFO_ENTRY_SIZE
            }
            TlvRecord::StaticPoints(points) => points.len() * POINT_ENTRY_SIZE,
            TlvRecord::TrackedObjects(objects) => objects.len() * TRACKED_OBJECT_ENTRY_SIZE,
            TlvRecord::Association(ids) => ids.len() * ASSOCIATION_ENTRY_SIZE,
            TlvRecord::Unknown { payload, .. } => payload.len(),
        }
    }

    /// Size on the wire, header included.
    pub fn wire_size(&self) -> usize {
        TLV_HEADER_SIZE + self.payload_len()
    }

    /// Append the record, header included.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.tlv_type());
        dst.put_u32_le(self.payload_len() as u32);

        match self {
            TlvRecord::DynamicPoints(points) => {
                for p in points {
                    dst.put_f32_le(p.range);
                    dst.put_f32_le(p.angle);
                    dst.put_f32_le(p.elev);
                    dst.put_f32_le(p.doppler);
                }
            }
            TlvRecord::DynamicSideInfo(info) | TlvRecord::StaticSideInfo(info) => {
                for i in info {
                    dst.put_u16_le(i.snr);
                    dst.put_u16_le(i.noise);
                }
            }
            TlvRecord::StaticPoints(points) => {
                for p in points {
                    dst.put_f32_le(p.x);
                    dst.put_f32_le(p.y);
                    dst.put_f32_le(p.z);
                    dst.put_f32_le(p.doppler);
                }
            }
            TlvRecord::TrackedObjects(objects) => {
                for o in objects {
                    dst.put_u32_le(o.target_id);
                    put_vec3(dst, &o.position);
                    put_vec3(dst, &o.velocity);
                    put_vec3(dst, &o.acceleration);
                }
            }
            TlvRecord::Association(ids) => dst.put_slice(ids),
            TlvRecord::Unknown { payload, .. } => dst.put_slice(payload),
        }
    }
}

fn entries(tlv_type: u32, payload: &Bytes, entry_size: usize) -> Result<usize> {
    if payload.len() % entry_size != 0 {
        return Err(DecodeError::MisalignedPayload {
            tlv_type,
            length: payload.len(),
            entry_size,
        });
    }
    Ok(payload.len() / entry_size)
}

fn get_vec3(src: &mut Bytes) -> Vec3 {
    Vec3::new(src.get_f32_le(), src.get_f32_le(), src.get_f32_le())
}

fn put_vec3(dst: &mut impl BufMut, v: &Vec3) {
    dst.put_f32_le(v.x);
    dst.put_f32_le(v.y);
    dst.put_f32_le(v.z);
}
