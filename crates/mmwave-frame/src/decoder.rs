use bytes::{Buf, Bytes};
use mmwave_transport::ByteSource;
use tracing::{trace, warn};

use crate::codec::{
    decode_header, tlv_budget, DEFAULT_MAX_PACKET_LEN, HEADER_SIZE, TLV_HEADER_SIZE,
};
use crate::error::{DecodeError, Result};
use crate::geometry::{transform_direction, transform_point, transform_spherical_point, Mount};
use crate::tlv::{
    SideInfo, TlvRecord, TLV_ASSOCIATION, TLV_DYNAMIC_SIDE_INFO, TLV_STATIC_SIDE_INFO,
};
use crate::types::{DynamicPoint, Frame, StaticPoint, TrackedObject, Vec3, UNASSOCIATED};

/// Configuration for the frame decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Sensor placement applied to every decoded coordinate.
    pub mount: Mount,
    /// Largest accepted `total_packet_len`. Default: 64 KiB.
    pub max_packet_len: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mount: Mount::default(),
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
        }
    }
}

/// Decodes one frame at a time from a source positioned after the marker.
///
/// The decoder holds no per-frame state; a failed frame leaves nothing
/// behind and the caller resynchronizes on the next marker.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    config: DecoderConfig,
}

/// Which primary lists have been seen in the current frame.
#[derive(Default)]
struct Seen {
    dynamic: bool,
    statics: bool,
}

impl FrameDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Consume exactly one frame (header and all TLVs) from `source`.
    pub fn decode<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<Frame> {
        let raw = read_exact(source, HEADER_SIZE, "frame header")?;
        let header = decode_header(&raw)?;
        let mut remaining = tlv_budget(&header, self.config.max_packet_len)?;

        let mut frame = Frame::new(header);
        let mut seen = Seen::default();

        for tlv_index in 0..header.num_tlvs as usize {
            if remaining < TLV_HEADER_SIZE {
                return Err(DecodeError::LengthOverrun {
                    tlv_index,
                    length: TLV_HEADER_SIZE,
                    remaining,
                });
            }
            let mut tl = read_exact(source, TLV_HEADER_SIZE, "TLV header")?;
            remaining -= TLV_HEADER_SIZE;

            let tlv_type = tl.get_u32_le();
            let length = tl.get_u32_le() as usize;
            if length > remaining {
                return Err(DecodeError::LengthOverrun {
                    tlv_index,
                    length,
                    remaining,
                });
            }
            let payload = read_exact(source, length, "TLV payload")?;
            remaining -= length;

            let record = TlvRecord::parse(tlv_type, payload)?;
            self.apply(&mut frame, &mut seen, record)?;
        }

        trace!(
            frame_number = frame.header.frame_number,
            dynamic = frame.dynamic_points.len(),
            statics = frame.static_points.len(),
            tracked = frame.tracked_objects.len(),
            "decoded frame"
        );
        Ok(frame)
    }

    fn apply(&self, frame: &mut Frame, seen: &mut Seen, record: TlvRecord) -> Result<()> {
        let mount = &self.config.mount;
        let identity = mount.is_identity();

        match record {
            TlvRecord::DynamicPoints(points) => {
                frame.dynamic_points = points
                    .into_iter()
                    .map(|p| {
                        let (range, angle, elev) = if identity {
                            (p.range, p.angle, p.elev)
                        } else {
                            let (r, a, e) = transform_spherical_point(
                                f64::from(p.range),
                                f64::from(p.angle),
                                f64::from(p.elev),
                                mount,
                            );
                            (r as f32, a as f32, e as f32)
                        };
                        DynamicPoint {
                            target_id: UNASSOCIATED,
                            range,
                            angle,
                            elev,
                            doppler: p.doppler,
                            snr: 0,
                            noise: 0,
                        }
                    })
                    .collect();
                seen.dynamic = true;
            }
            TlvRecord::DynamicSideInfo(info) => {
                check_augment(
                    TLV_DYNAMIC_SIDE_INFO,
                    seen.dynamic,
                    info.len(),
                    frame.dynamic_points.len(),
                )?;
                for (point, SideInfo { snr, noise }) in frame.dynamic_points.iter_mut().zip(info) {
                    point.snr = snr;
                    point.noise = noise;
                }
            }
            TlvRecord::StaticPoints(points) => {
                frame.static_points = points
                    .into_iter()
                    .map(|p| {
                        let (x, y, z) = if identity {
                            (p.x, p.y, p.z)
                        } else {
                            narrow(transform_point(
                                f64::from(p.x),
                                f64::from(p.y),
                                f64::from(p.z),
                                mount,
                            ))
                        };
                        StaticPoint {
                            x,
                            y,
                            z,
                            doppler: p.doppler,
                            snr: 0,
                            noise: 0,
                        }
                    })
                    .collect();
                seen.statics = true;
            }
            TlvRecord::StaticSideInfo(info) => {
                check_augment(
                    TLV_STATIC_SIDE_INFO,
                    seen.statics,
                    info.len(),
                    frame.static_points.len(),
                )?;
                for (point, SideInfo { snr, noise }) in frame.static_points.iter_mut().zip(info) {
                    point.snr = snr;
                    point.noise = noise;
                }
            }
            TlvRecord::TrackedObjects(objects) => {
                frame.tracked_objects = if identity {
                    objects
                } else {
                    objects
                        .into_iter()
                        .map(|o| TrackedObject {
                            target_id: o.target_id,
                            position: apply_vec(o.position, |x, y, z| {
                                transform_point(x, y, z, mount)
                            }),
                            velocity: apply_vec(o.velocity, |x, y, z| {
                                transform_direction(x, y, z, mount)
                            }),
                            acceleration: apply_vec(o.acceleration, |x, y, z| {
                                transform_direction(x, y, z, mount)
                            }),
                        })
                        .collect()
                };
            }
            TlvRecord::Association(ids) => {
                check_augment(
                    TLV_ASSOCIATION,
                    seen.dynamic,
                    ids.len(),
                    frame.dynamic_points.len(),
                )?;
                for (point, id) in frame.dynamic_points.iter_mut().zip(ids) {
                    point.target_id = id;
                }
            }
            TlvRecord::Unknown { tlv_type, payload } => {
                warn!(tlv_type, length = payload.len(), "skipping unknown TLV");
            }
        }
        Ok(())
    }
}

/// Read exactly `n` bytes; anything shorter is a truncated frame.
fn read_exact<S: ByteSource + ?Sized>(
    source: &mut S,
    n: usize,
    context: &'static str,
) -> Result<Bytes> {
    let bytes = source.read(n)?;
    if bytes.len() < n {
        return Err(DecodeError::Truncated {
            context,
            expected: n,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn check_augment(
    tlv_type: u32,
    primary_seen: bool,
    entries: usize,
    available: usize,
) -> Result<()> {
    if !primary_seen {
        return Err(DecodeError::MissingPrimary { tlv_type });
    }
    if entries > available {
        return Err(DecodeError::IndexOutOfRange {
            tlv_type,
            entries,
            available,
        });
    }
    Ok(())
}

fn narrow((x, y, z): (f64, f64, f64)) -> (f32, f32, f32) {
    (x as f32, y as f32, z as f32)
}

fn apply_vec(v: Vec3, f: impl Fn(f64, f64, f64) -> (f64, f64, f64)) -> Vec3 {
    let (x, y, z) = narrow(f(f64::from(v.x), f64::from(v.y), f64::from(v.z)));
    Vec3::new(x, y, z)
}
