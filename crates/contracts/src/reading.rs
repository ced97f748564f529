//! ImcoderReading - Ingestion output
//!
//! One orientation report from a wheel-mounted imcoder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which wheel a reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelSide {
    Left,
    Right,
}

impl WheelSide {
    /// The opposite wheel
    pub fn other(self) -> Self {
        match self {
            WheelSide::Left => WheelSide::Right,
            WheelSide::Right => WheelSide::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WheelSide::Left => "left",
            WheelSide::Right => "right",
        }
    }
}

impl fmt::Display for WheelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation quaternion as carried on the wire (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `yaw` radians about the z axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }

    /// Rotation of `angle` radians about a unit `axis`
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let (sin, cos) = (angle * 0.5).sin_cos();
        Self {
            x: axis[0] * sin,
            y: axis[1] * sin,
            z: axis[2] * sin,
            w: cos,
        }
    }

    /// Euclidean norm of the four components
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }

    /// Heading encoded by a yaw-only quaternion
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Imcoder reading
///
/// One orientation sample from a wheel sensor. Immutable once received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImcoderReading {
    /// Wheel the sensor is mounted on
    pub side: WheelSide,

    /// Sensor header stamp (seconds, f64) - primary clock
    pub timestamp: f64,

    /// Optional sequence number (ordering/diagnostics)
    #[serde(default)]
    pub seq: Option<u64>,

    /// Sensor orientation
    pub orientation: Quaternion,
}

impl ImcoderReading {
    pub fn new(side: WheelSide, timestamp: f64, orientation: Quaternion) -> Self {
        Self {
            side,
            timestamp,
            seq: None,
            orientation,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}
