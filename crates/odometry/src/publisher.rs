//! Formats estimator state into outgoing odometry frames.

use contracts::{
    diagonal_covariance, EstimatorConfig, EstimatorMeta, OdometryFrame, OdometryRecord,
    PoseEstimate, PoseTransform, Quaternion, Twist,
};

/// Pose variances (x, y, z, roll, pitch, yaw). Planar odometry never
/// observes z, roll or pitch.
pub const POSE_COVARIANCE_DIAGONAL: [f64; 6] = [1e-3, 1e-3, 1e6, 1e6, 1e6, 1e-2];

/// Twist variances (vx, vy, vz, wx, wy, wz)
pub const TWIST_COVARIANCE_DIAGONAL: [f64; 6] = [1e-3, 1e6, 1e6, 1e6, 1e6, 1e-2];

/// Builds odometry records and, optionally, the odom -> body transform
#[derive(Debug, Clone)]
pub struct OdometryPublisher {
    topic: String,
    frame_id: String,
    child_frame_id: String,
    publish_tf: bool,
    next_seq: u64,
}

impl OdometryPublisher {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            topic: config.odom_topic_name.clone(),
            frame_id: config.odom_frame_id.clone(),
            child_frame_id: config.odom_child_frame_id.clone(),
            publish_tf: config.publish_tf,
            next_seq: 0,
        }
    }

    pub fn publishes_tf(&self) -> bool {
        self.publish_tf
    }

    /// Package pose and twist stamped at `timestamp`
    pub fn publish(
        &mut self,
        timestamp: f64,
        pose: PoseEstimate,
        twist: Twist,
        meta: EstimatorMeta,
    ) -> OdometryFrame {
        let orientation = Quaternion::from_yaw(pose.theta);

        let odom = OdometryRecord {
            seq: self.next_seq,
            timestamp,
            frame_id: self.frame_id.clone(),
            child_frame_id: self.child_frame_id.clone(),
            pose,
            orientation,
            pose_covariance: diagonal_covariance(POSE_COVARIANCE_DIAGONAL),
            twist,
            twist_covariance: diagonal_covariance(TWIST_COVARIANCE_DIAGONAL),
        };
        self.next_seq += 1;

        let transform = self.publish_tf.then(|| PoseTransform {
            parent_frame_id: self.frame_id.clone(),
            child_frame_id: self.child_frame_id.clone(),
            timestamp,
            translation: [pose.x, pose.y, 0.0],
            rotation: orientation,
        });

        OdometryFrame {
            topic: self.topic.clone(),
            odom,
            transform,
            meta,
        }
    }

    pub fn reset(&mut self) {
        self.next_seq = 0;
    }
}
