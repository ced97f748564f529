//! Runtime configuration contracts for the pair matcher and the estimator.

use serde::{Deserialize, Serialize};

/// Body axis the wheel spins about, as seen by the mounted sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationAxis {
    /// Body x
    Roll,
    /// Body y
    #[default]
    Pitch,
    /// Body z
    Yaw,
}

impl RotationAxis {
    /// Unit vector of the axis in the sensor body frame
    pub fn unit_vector(self) -> [f64; 3] {
        match self {
            RotationAxis::Roll => [1.0, 0.0, 0.0],
            RotationAxis::Pitch => [0.0, 1.0, 0.0],
            RotationAxis::Yaw => [0.0, 0.0, 1.0],
        }
    }
}

/// Pose integration scheme for non-straight motion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Advance along heading + dtheta/2
    #[default]
    Midpoint,
    /// Advance along the circular arc of radius d/dtheta
    ExactArc,
}

/// Pair matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Maximum stamp difference between matched readings (seconds)
    pub tolerance_sec: f64,

    /// Maximum buffered readings per side
    pub queue_size: usize,

    /// How far the partner side may run ahead before an unsettled pivot is
    /// emitted without waiting for its successor (seconds)
    pub max_wait_sec: f64,

    /// Readings older than the newest buffered stamp by more than this are
    /// evicted (seconds)
    pub max_age_sec: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            tolerance_sec: 0.02,
            queue_size: 10,
            max_wait_sec: 0.1,
            max_age_sec: 1.0,
        }
    }
}

/// Estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Wheel radius r (m)
    pub wheel_radius: f64,

    /// Track width L (m)
    pub wheel_separation: f64,

    /// Heading changes below this are treated as noise (rad)
    pub dtheta_threshold: f64,

    #[serde(default)]
    pub rotation_axis: RotationAxis,

    #[serde(default)]
    pub integration: IntegrationMethod,

    /// Pairs further apart than this reseed the wheels instead of
    /// integrating (seconds)
    pub max_gap_sec: f64,

    /// Fixed odometry frame
    pub odom_frame_id: String,

    /// Robot body frame
    pub odom_child_frame_id: String,

    /// Topic stamped on emitted frames
    pub odom_topic_name: String,

    /// Emit the odom -> body transform alongside every record
    pub publish_tf: bool,

    /// Log every update at info level
    pub debug_mode: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 0.05,
            wheel_separation: 0.3,
            dtheta_threshold: 0.001,
            rotation_axis: RotationAxis::default(),
            integration: IntegrationMethod::default(),
            max_gap_sec: 0.5,
            odom_frame_id: "odom".to_string(),
            odom_child_frame_id: "base_link".to_string(),
            odom_topic_name: "imcoders/odom".to_string(),
            publish_tf: true,
            debug_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_axis_is_pitch() {
        assert_eq!(RotationAxis::default().unit_vector(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn integration_method_parses_snake_case() {
        let method: IntegrationMethod = serde_json::from_str("\"exact_arc\"").unwrap();
        assert_eq!(method, IntegrationMethod::ExactArc);
    }
}
