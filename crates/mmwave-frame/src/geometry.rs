//! Mounting-pose correction for sensor-frame coordinates.
//!
//! The sensor reports positions relative to its own boresight. A [`Mount`]
//! describes how the board sits in the room (height above the floor, tilt
//! about the x axis, rotation about the vertical axis) and the functions
//! here map sensor coordinates into room coordinates.

use serde::{Deserialize, Serialize};

/// Physical placement of the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    /// Height above the ground, metres.
    pub height: f64,
    /// Rotation about the x axis, radians.
    pub elevation_tilt: f64,
    /// Rotation about the z axis, radians.
    pub azimuth_tilt: f64,
}

impl Mount {
    /// A mount at `height` metres tilted by `elevation_tilt` radians.
    pub fn new(height: f64, elevation_tilt: f64) -> Self {
        Self {
            height,
            elevation_tilt,
            azimuth_tilt: 0.0,
        }
    }

    pub fn with_azimuth_tilt(mut self, azimuth_tilt: f64) -> Self {
        self.azimuth_tilt = azimuth_tilt;
        self
    }

    /// True when the mount leaves coordinates untouched.
    pub fn is_identity(&self) -> bool {
        self.height == 0.0 && self.elevation_tilt == 0.0 && self.azimuth_tilt == 0.0
    }

    fn rotate(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (sin_el, cos_el) = self.elevation_tilt.sin_cos();
        let (sin_az, cos_az) = self.azimuth_tilt.sin_cos();

        let ex = x;
        let ey = cos_el * y - sin_el * z;
        let ez = sin_el * y + cos_el * z;

        (cos_az * ex - sin_az * ey, sin_az * ex + cos_az * ey, ez)
    }
}

/// (range, azimuth, elevation) → (x, y, z).
pub fn spherical_to_cartesian(range: f64, angle: f64, elev: f64) -> (f64, f64, f64) {
    let x = range * elev.cos() * angle.cos();
    let y = range * elev.cos() * angle.sin();
    let z = range * elev.sin();
    (x, y, z)
}

/// (x, y, z) → (range, azimuth, elevation). The origin maps to all zeros.
pub fn cartesian_to_spherical(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let range = (x * x + y * y + z * z).sqrt();
    if range == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let angle = y.atan2(x);
    let elev = (z / range).clamp(-1.0, 1.0).asin();
    (range, angle, elev)
}

/// Rotate a position by the mount tilt and lift it by the mount height.
pub fn transform_point(x: f64, y: f64, z: f64, mount: &Mount) -> (f64, f64, f64) {
    let (rx, ry, rz) = mount.rotate(x, y, z);
    (rx, ry, rz + mount.height)
}

/// Rotate a direction (velocity, acceleration) by the mount tilt only.
pub fn transform_direction(x: f64, y: f64, z: f64, mount: &Mount) -> (f64, f64, f64) {
    mount.rotate(x, y, z)
}

/// Apply [`transform_point`] to a point given in spherical coordinates.
pub fn transform_spherical_point(
    range: f64,
    angle: f64,
    elev: f64,
    mount: &Mount,
) -> (f64, f64, f64) {
    let (x, y, z) = spherical_to_cartesian(range, angle, elev);
    let (x, y, z) = transform_point(x, y, z, mount);
    cartesian_to_spherical(x, y, z)
}
