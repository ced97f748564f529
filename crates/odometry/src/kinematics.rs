//! Differential drive kinematics.
//!
//! Converts per-wheel spin deltas into a pose update in the fixed odometry
//! frame, where:
//! - x = forward at theta = 0
//! - y = left
//! - theta = counter-clockwise rotation

use std::f64::consts::{PI, TAU};

use contracts::{ContractError, EstimatorConfig, IntegrationMethod, PoseEstimate, Twist};

/// Normalize angle to (-π, π].
///
/// Angles already in range are returned unchanged, bit for bit.
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Shortest signed angular difference from `a` to `b`
#[inline]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(b - a)
}

/// Robot geometry and integration settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffDriveParams {
    /// Wheel radius r (m)
    pub wheel_radius: f64,
    /// Track width L (m)
    pub wheel_separation: f64,
    /// Heading changes with |dθ| below this are treated as noise (rad)
    pub dtheta_threshold: f64,
    pub method: IntegrationMethod,
}

impl From<&EstimatorConfig> for DiffDriveParams {
    fn from(config: &EstimatorConfig) -> Self {
        Self {
            wheel_radius: config.wheel_radius,
            wheel_separation: config.wheel_separation,
            dtheta_threshold: config.dtheta_threshold,
            method: config.integration,
        }
    }
}

/// Wheel and body displacement for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelDisplacement {
    /// d_L = r·Δφ_L (m)
    pub left: f64,
    /// d_R = r·Δφ_R (m)
    pub right: f64,
    /// d = (d_L + d_R) / 2 (m)
    pub linear: f64,
    /// dθ = (d_R − d_L) / L (rad)
    pub dtheta: f64,
}

/// Result of one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    pub pose: PoseEstimate,
    pub twist: Twist,
    pub displacement: WheelDisplacement,
    /// Heading change was below the threshold and left out of theta
    pub suppressed: bool,
}

/// Differential drive integrator
#[derive(Debug, Clone)]
pub struct DiffDriveKinematics {
    params: DiffDriveParams,
}

impl DiffDriveKinematics {
    /// Create an integrator, rejecting unusable geometry
    pub fn new(params: DiffDriveParams) -> Result<Self, ContractError> {
        if !(params.wheel_radius.is_finite() && params.wheel_radius > 0.0) {
            return Err(ContractError::config_validation(
                "kinematics.wheel_radius",
                format!("must be a positive number, got {}", params.wheel_radius),
            ));
        }
        if !(params.wheel_separation.is_finite() && params.wheel_separation > 0.0) {
            return Err(ContractError::config_validation(
                "kinematics.wheel_separation",
                format!("must be a positive number, got {}", params.wheel_separation),
            ));
        }
        if !(params.dtheta_threshold.is_finite() && params.dtheta_threshold >= 0.0) {
            return Err(ContractError::config_validation(
                "kinematics.dtheta_threshold",
                format!("must be a non-negative number, got {}", params.dtheta_threshold),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &DiffDriveParams {
        &self.params
    }

    /// Wheel and body displacement for the given spin deltas
    pub fn displacement(&self, dphi_left: f64, dphi_right: f64) -> WheelDisplacement {
        let left = self.params.wheel_radius * dphi_left;
        let right = self.params.wheel_radius * dphi_right;
        WheelDisplacement {
            left,
            right,
            linear: (left + right) / 2.0,
            dtheta: (right - left) / self.params.wheel_separation,
        }
    }

    /// Integrate one step from `pose`.
    ///
    /// Returns `None` when `dt` is not a positive number; the caller keeps
    /// its previous pose.
    pub fn integrate(
        &self,
        pose: &PoseEstimate,
        dphi_left: f64,
        dphi_right: f64,
        dt: f64,
    ) -> Option<Integration> {
        if !(dt > 0.0 && dt.is_finite()) {
            return None;
        }

        let displacement = self.displacement(dphi_left, dphi_right);
        let WheelDisplacement { linear: d, dtheta, .. } = displacement;

        let suppressed = dtheta.abs() < self.params.dtheta_threshold;
        let straight = suppressed || dtheta == 0.0;

        let next = if straight {
            // Heading left untouched, translation along the previous heading
            PoseEstimate {
                x: pose.x + d * pose.theta.cos(),
                y: pose.y + d * pose.theta.sin(),
                theta: pose.theta,
            }
        } else {
            match self.params.method {
                IntegrationMethod::Midpoint => {
                    let heading = pose.theta + dtheta / 2.0;
                    PoseEstimate {
                        x: pose.x + d * heading.cos(),
                        y: pose.y + d * heading.sin(),
                        theta: normalize_angle(pose.theta + dtheta),
                    }
                }
                IntegrationMethod::ExactArc => {
                    // Radius to the instantaneous center of curvature
                    let radius = d / dtheta;
                    let end = pose.theta + dtheta;
                    PoseEstimate {
                        x: pose.x + radius * (end.sin() - pose.theta.sin()),
                        y: pose.y - radius * (end.cos() - pose.theta.cos()),
                        theta: normalize_angle(end),
                    }
                }
            }
        };

        let twist = Twist {
            linear: d / dt,
            angular: if straight { 0.0 } else { dtheta / dt },
        };

        Some(Integration {
            pose: next,
            twist,
            displacement,
            suppressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use std::f64::consts::FRAC_PI_2;

    fn params() -> DiffDriveParams {
        DiffDriveParams {
            wheel_radius: 0.05,
            wheel_separation: 0.3,
            dtheta_threshold: 0.001,
            method: IntegrationMethod::Midpoint,
        }
    }

    fn kinematics() -> DiffDriveKinematics {
        DiffDriveKinematics::new(params()).unwrap()
    }

    #[test]
    fn test_normalize_angle_range() {
        assert_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(2.0 * PI), 0.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(PI + 0.1), -PI + 0.1, epsilon = 1e-12);
        assert_eq!(normalize_angle(0.3), 0.3);
    }

    #[test]
    fn test_angle_diff_crosses_boundary() {
        assert_relative_eq!(angle_diff(PI - 0.1, -PI + 0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(0.0, FRAC_PI_2), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let bad_radius = DiffDriveParams {
            wheel_radius: 0.0,
            ..params()
        };
        assert!(DiffDriveKinematics::new(bad_radius).is_err());

        let bad_separation = DiffDriveParams {
            wheel_separation: -0.3,
            ..params()
        };
        assert!(DiffDriveKinematics::new(bad_separation).is_err());

        let bad_threshold = DiffDriveParams {
            dtheta_threshold: f64::NAN,
            ..params()
        };
        assert!(DiffDriveKinematics::new(bad_threshold).is_err());
    }

    #[test]
    fn test_zero_motion_keeps_pose() {
        let k = kinematics();
        let mut rng = rand::rng();
        for _ in 0..100 {
            let pose = PoseEstimate::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-3.0..3.0),
            );
            let step = k.integrate(&pose, 0.0, 0.0, 0.1).unwrap();
            assert_eq!(step.pose, pose);
            assert_eq!(step.twist, Twist::default());
        }
    }

    #[test]
    fn test_straight_line_advances_along_heading() {
        let k = kinematics();
        let mut rng = rand::rng();
        for _ in 0..100 {
            let pose = PoseEstimate::new(1.0, -2.0, rng.random_range(-3.0..3.0));
            let dphi = rng.random_range(0.01..2.0);
            let step = k.integrate(&pose, dphi, dphi, 0.1).unwrap();

            let d = 0.05 * dphi;
            assert_eq!(step.pose.theta, pose.theta);
            assert_relative_eq!(step.pose.x, pose.x + d * pose.theta.cos(), epsilon = 1e-12);
            assert_relative_eq!(step.pose.y, pose.y + d * pose.theta.sin(), epsilon = 1e-12);
            assert_relative_eq!(step.twist.linear, d / 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pure_rotation_keeps_position() {
        let k = kinematics();
        let mut rng = rand::rng();
        for _ in 0..100 {
            let pose = PoseEstimate::new(0.5, 0.5, rng.random_range(-1.0..1.0));
            let dphi = rng.random_range(0.1..1.0);
            let step = k.integrate(&pose, -dphi, dphi, 0.1).unwrap();

            assert_relative_eq!(step.pose.x, pose.x, epsilon = 1e-12);
            assert_relative_eq!(step.pose.y, pose.y, epsilon = 1e-12);
            let expected = normalize_angle(pose.theta + 2.0 * 0.05 * dphi / 0.3);
            assert_relative_eq!(step.pose.theta, expected, epsilon = 1e-12);
            assert!(!step.suppressed);
        }
    }

    #[test]
    fn test_small_heading_change_suppressed() {
        let k = kinematics();
        let pose = PoseEstimate::new(0.0, 0.0, 0.7);
        // dθ = 0.05 * 0.005 / 0.3 ≈ 0.00083 < 0.001
        let step = k.integrate(&pose, 0.1, 0.105, 0.1).unwrap();

        assert!(step.suppressed);
        assert_eq!(step.pose.theta, pose.theta);
        assert_eq!(step.twist.angular, 0.0);
        let d = step.displacement.linear;
        assert_relative_eq!(step.pose.x, d * 0.7f64.cos(), epsilon = 1e-12);
        assert_relative_eq!(step.pose.y, d * 0.7f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_heading_wraps_into_negative_range() {
        let k = kinematics();
        let mut pose = PoseEstimate::default();
        // Each step turns 2 * 0.05 * 0.6 / 0.3 = 0.2 rad
        for _ in 0..20 {
            pose = k.integrate(&pose, -0.6, 0.6, 0.1).unwrap().pose;
            assert!(pose.theta > -PI && pose.theta <= PI);
        }
        // 4.0 rad total
        assert_relative_eq!(pose.theta, 4.0 - 2.0 * PI, epsilon = 1e-9);
        assert!(pose.theta < 0.0);
    }

    #[test]
    fn test_scenario_two_pairs() {
        let k = kinematics();

        let first = k.integrate(&PoseEstimate::default(), 0.1, 0.1, 0.1).unwrap();
        assert_eq!(first.pose.theta, 0.0);
        assert_relative_eq!(first.pose.x, 0.005, epsilon = 1e-12);
        assert_eq!(first.pose.y, 0.0);

        let second = k.integrate(&first.pose, 0.1, 0.2, 0.1).unwrap();
        let dtheta = (0.01 - 0.005) / 0.3;
        assert_relative_eq!(second.displacement.dtheta, dtheta, epsilon = 1e-12);
        assert_relative_eq!(second.pose.theta, dtheta, epsilon = 1e-12);
        let d = 0.0075;
        assert_relative_eq!(second.pose.x, 0.005 + d * (dtheta / 2.0).cos(), epsilon = 1e-12);
        assert_relative_eq!(second.pose.y, d * (dtheta / 2.0).sin(), epsilon = 1e-12);
        assert_relative_eq!(second.twist.linear, 0.075, epsilon = 1e-12);
        assert_relative_eq!(second.twist.angular, dtheta / 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_arc_quarter_circle() {
        let k = DiffDriveKinematics::new(DiffDriveParams {
            method: IntegrationMethod::ExactArc,
            ..params()
        })
        .unwrap();

        // Left wheel still, right wheel traces a quarter circle of radius L
        let right_arc = 0.3 * FRAC_PI_2;
        let dphi_right = right_arc / 0.05;
        let step = k.integrate(&PoseEstimate::default(), 0.0, dphi_right, 1.0).unwrap();

        // Body center sits on a circle of radius L/2
        assert_relative_eq!(step.pose.theta, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(step.pose.x, 0.15, epsilon = 1e-12);
        assert_relative_eq!(step.pose.y, 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_dt_rejected() {
        let k = kinematics();
        let pose = PoseEstimate::default();
        assert!(k.integrate(&pose, 0.1, 0.1, 0.0).is_none());
        assert!(k.integrate(&pose, 0.1, 0.1, -0.01).is_none());
        assert!(k.integrate(&pose, 0.1, 0.1, f64::NAN).is_none());
    }
}
