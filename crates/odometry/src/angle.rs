//! Wheel spin angle from imcoder orientation.
//!
//! The sensor rotates rigidly with the wheel, so the wheel's spin between two
//! readings is the body-frame relative rotation `q_prev⁻¹ · q_curr` projected
//! onto the spin axis. Taking the shortest-path rotation vector keeps the
//! delta continuous across the ±π boundary of any Euler representation.

use contracts::{Quaternion, RotationAxis};
use nalgebra::{Quaternion as RawQuaternion, UnitQuaternion, Vector3};

/// Accepted deviation of a raw quaternion norm from 1
pub const NORM_TOLERANCE: f64 = 0.1;

/// Convert a wire quaternion to a unit quaternion.
///
/// Returns `None` for non-finite components or a norm too far from 1;
/// small norm errors are normalized away.
pub fn to_unit_quaternion(q: &Quaternion) -> Option<UnitQuaternion<f64>> {
    if !q.is_finite() || (q.norm() - 1.0).abs() > NORM_TOLERANCE {
        return None;
    }
    Some(UnitQuaternion::from_quaternion(RawQuaternion::new(
        q.w, q.x, q.y, q.z,
    )))
}

/// Wire representation of a unit quaternion
pub fn from_unit_quaternion(q: &UnitQuaternion<f64>) -> Quaternion {
    let raw = q.quaternion();
    Quaternion::new(raw.i, raw.j, raw.k, raw.w)
}

/// Signed rotation about `axis` taking `prev` to `curr`, in (-π, π]
pub fn relative_angle(
    prev: &UnitQuaternion<f64>,
    curr: &UnitQuaternion<f64>,
    axis: &Vector3<f64>,
) -> f64 {
    let relative = prev.inverse() * curr;
    relative.scaled_axis().dot(axis)
}

/// Euler angle of an orientation about the given axis
pub fn absolute_angle(q: &UnitQuaternion<f64>, axis: RotationAxis) -> f64 {
    let (roll, pitch, yaw) = q.euler_angles();
    match axis {
        RotationAxis::Roll => roll,
        RotationAxis::Pitch => pitch,
        RotationAxis::Yaw => yaw,
    }
}

/// Per-wheel state owned by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelState {
    /// Last accepted orientation, `None` until the first valid reading
    pub orientation: Option<UnitQuaternion<f64>>,

    /// Unwrapped spin angle since start (rad)
    pub cumulative: f64,

    /// Stamp of the last committed reading
    pub last_stamp: Option<f64>,
}

/// Outcome of observing one reading, not yet committed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    /// Spin since the stored orientation (rad)
    pub delta: f64,

    /// Orientation to store on commit, `None` when the reading was rejected
    pub orientation: Option<UnitQuaternion<f64>>,

    /// Reading rejected as degenerate
    pub degenerate: bool,
}

/// Tracks one wheel's spin angle
#[derive(Debug, Clone)]
pub struct WheelAngleTracker {
    axis: RotationAxis,
    axis_vector: Vector3<f64>,
    state: WheelState,
}

impl WheelAngleTracker {
    pub fn new(axis: RotationAxis) -> Self {
        let [x, y, z] = axis.unit_vector();
        Self {
            axis,
            axis_vector: Vector3::new(x, y, z),
            state: WheelState::default(),
        }
    }

    /// Measure a reading against the stored orientation without mutating.
    ///
    /// The first valid reading yields a zero delta; a degenerate reading
    /// yields a zero delta and keeps the stored orientation.
    pub fn observe(&self, orientation: &Quaternion) -> AngleSample {
        let Some(current) = to_unit_quaternion(orientation) else {
            return AngleSample {
                delta: 0.0,
                orientation: None,
                degenerate: true,
            };
        };

        let delta = match &self.state.orientation {
            Some(previous) => relative_angle(previous, &current, &self.axis_vector),
            None => 0.0,
        };

        AngleSample {
            delta,
            orientation: Some(current),
            degenerate: false,
        }
    }

    /// Apply an observed sample
    pub fn commit(&mut self, sample: &AngleSample, stamp: f64) {
        if let Some(orientation) = sample.orientation {
            self.state.orientation = Some(orientation);
        }
        self.state.cumulative += sample.delta;
        self.state.last_stamp = Some(stamp);
    }

    /// Replace the reference orientation without accumulating any spin.
    ///
    /// Returns `false` when the reading was degenerate and the previous
    /// reference was kept.
    pub fn reseed(&mut self, orientation: &Quaternion, stamp: f64) -> bool {
        self.state.last_stamp = Some(stamp);
        match to_unit_quaternion(orientation) {
            Some(q) => {
                self.state.orientation = Some(q);
                true
            }
            None => false,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.state.orientation.is_some()
    }

    pub fn cumulative(&self) -> f64 {
        self.state.cumulative
    }

    pub fn state(&self) -> &WheelState {
        &self.state
    }

    /// Euler angle of the stored orientation about the spin axis
    pub fn current_angle(&self) -> Option<f64> {
        self.state
            .orientation
            .as_ref()
            .map(|q| absolute_angle(q, self.axis))
    }

    pub fn reset(&mut self) {
        self.state = WheelState::default();
    }
}
