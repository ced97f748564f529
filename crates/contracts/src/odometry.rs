//! OdometryFrame - Estimator output
//!
//! Pose, twist and optional transform handed to the dispatcher.

use serde::{Deserialize, Serialize};

use crate::Quaternion;

/// Planar pose in the odometry frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Position x (m)
    pub x: f64,
    /// Position y (m)
    pub y: f64,
    /// Heading (rad), wrapped to (-pi, pi]
    pub theta: f64,
}

impl PoseEstimate {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Straight-line distance to another pose
    pub fn distance_to(&self, other: &PoseEstimate) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Body velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    /// Linear velocity along body x (m/s)
    pub linear: f64,
    /// Angular velocity about body z (rad/s)
    pub angular: f64,
}

/// Row-major 6x6 covariance (x, y, z, roll, pitch, yaw)
pub type Covariance = [[f64; 6]; 6];

/// Diagonal covariance with the given variances
pub fn diagonal_covariance(diag: [f64; 6]) -> Covariance {
    let mut cov = [[0.0; 6]; 6];
    for (i, v) in diag.into_iter().enumerate() {
        cov[i][i] = v;
    }
    cov
}

/// Structured odometry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryRecord {
    /// Record sequence number
    pub seq: u64,

    /// Stamp of the pair that produced this record (seconds)
    pub timestamp: f64,

    /// Fixed odometry frame
    pub frame_id: String,

    /// Robot body frame
    pub child_frame_id: String,

    pub pose: PoseEstimate,

    /// Heading as a yaw-only quaternion
    pub orientation: Quaternion,

    pub pose_covariance: Covariance,

    pub twist: Twist,

    pub twist_covariance: Covariance,
}

/// Rigid transform from the odometry frame to the body frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseTransform {
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub timestamp: f64,
    /// (x, y, 0)
    pub translation: [f64; 3],
    /// Yaw-only rotation
    pub rotation: Quaternion,
}

/// How an emitted record was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// First pair: wheel references seeded, pose untouched
    #[default]
    Seeded,
    /// Pose integrated with heading change
    Integrated,
    /// Heading change below threshold, straight-line update
    HeadingSuppressed,
    /// Pair stamp did not advance, previous record republished
    NonPositiveDt,
    /// Gap between pairs too long, references reseeded with zero delta
    GapReseeded,
}

impl UpdateStatus {
    /// Every status, in declaration order
    pub const ALL: [UpdateStatus; 5] = [
        UpdateStatus::Seeded,
        UpdateStatus::Integrated,
        UpdateStatus::HeadingSuppressed,
        UpdateStatus::NonPositiveDt,
        UpdateStatus::GapReseeded,
    ];

    /// Position in [`UpdateStatus::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Seeded => "seeded",
            UpdateStatus::Integrated => "integrated",
            UpdateStatus::HeadingSuppressed => "heading_suppressed",
            UpdateStatus::NonPositiveDt => "non_positive_dt",
            UpdateStatus::GapReseeded => "gap_reseeded",
        }
    }

    /// Whether this update advanced the pose integral
    pub fn advanced_pose(self) -> bool {
        matches!(
            self,
            UpdateStatus::Integrated | UpdateStatus::HeadingSuppressed
        )
    }
}

/// Estimator metadata attached to every frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorMeta {
    pub status: UpdateStatus,

    /// Pair that triggered this frame
    pub pair_id: u64,

    /// Elapsed time since the previous accepted pair (seconds)
    pub dt: f64,

    /// Left wheel angle delta (rad)
    pub left_delta: f64,

    /// Right wheel angle delta (rad)
    pub right_delta: f64,

    /// Left wheel cumulative angle (rad)
    pub left_cumulative: f64,

    /// Right wheel cumulative angle (rad)
    pub right_cumulative: f64,

    /// Left orientation was rejected as degenerate
    pub degenerate_left: bool,

    /// Right orientation was rejected as degenerate
    pub degenerate_right: bool,

    /// Left/right stamp skew of the pair (seconds)
    pub skew: f64,
}

/// Odometry frame - unit handed to sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryFrame {
    /// Output topic of the odometry record
    pub topic: String,

    pub odom: OdometryRecord,

    /// Present only when transform publishing is enabled
    pub transform: Option<PoseTransform>,

    pub meta: EstimatorMeta,
}

impl OdometryFrame {
    pub fn timestamp(&self) -> f64 {
        self.odom.timestamp
    }

    pub fn seq(&self) -> u64 {
        self.odom.seq
    }
}
