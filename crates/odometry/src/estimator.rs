//! Imcoder odometry estimator.

use contracts::{
    ContractError, EstimatorConfig, EstimatorMeta, ImcoderPair, OdometryFrame, PoseEstimate,
    Twist, UpdateStatus, WheelSide,
};
use tracing::instrument;

use crate::angle::{AngleSample, WheelAngleTracker, WheelState};
use crate::kinematics::{DiffDriveKinematics, DiffDriveParams};
use crate::publisher::OdometryPublisher;

/// Differential odometry from a pair of wheel imcoders
///
/// Owns both wheel states and the pose. Every matched pair is processed to
/// completion before the next one (`&mut self`), and a pair either commits
/// wheels, pose, twist and stamp together or leaves all of them untouched.
#[derive(Debug)]
pub struct OdometryEstimator {
    config: EstimatorConfig,
    kinematics: DiffDriveKinematics,
    publisher: OdometryPublisher,
    left: WheelAngleTracker,
    right: WheelAngleTracker,
    pose: PoseEstimate,
    twist: Twist,
    last_stamp: Option<f64>,
    last_frame: Option<OdometryFrame>,
    distance: f64,
}

impl OdometryEstimator {
    /// Create an estimator; invalid geometry is a fatal configuration error
    pub fn new(config: EstimatorConfig) -> Result<Self, ContractError> {
        let kinematics = DiffDriveKinematics::new(DiffDriveParams::from(&config))?;
        if !(config.max_gap_sec.is_finite() && config.max_gap_sec > 0.0) {
            return Err(ContractError::config_validation(
                "kinematics.max_gap_sec",
                format!("must be a positive number, got {}", config.max_gap_sec),
            ));
        }

        Ok(Self {
            publisher: OdometryPublisher::new(&config),
            left: WheelAngleTracker::new(config.rotation_axis),
            right: WheelAngleTracker::new(config.rotation_axis),
            kinematics,
            config,
            pose: PoseEstimate::default(),
            twist: Twist::default(),
            last_stamp: None,
            last_frame: None,
            distance: 0.0,
        })
    }

    /// Process one matched pair and return the frame to publish
    #[instrument(
        level = "trace",
        name = "odometry_update",
        skip(self, pair),
        fields(pair_id = pair.pair_id, stamp = pair.stamp)
    )]
    pub fn update(&mut self, pair: &ImcoderPair) -> OdometryFrame {
        let Some(last_stamp) = self.last_stamp else {
            return self.seed(pair);
        };

        let dt = pair.stamp - last_stamp;
        if !(dt > 0.0) {
            return self.republish(pair, dt);
        }
        if dt > self.config.max_gap_sec {
            return self.reseed(pair, dt);
        }

        let left = self.left.observe(&pair.left.orientation);
        let right = self.right.observe(&pair.right.orientation);
        self.warn_degenerate(pair, &left, &right);

        let Some(step) = self.kinematics.integrate(&self.pose, left.delta, right.delta, dt)
        else {
            return self.republish(pair, dt);
        };

        // Commit everything for this pair at once
        self.left.commit(&left, pair.left.timestamp);
        self.right.commit(&right, pair.right.timestamp);
        self.distance += step.displacement.linear.abs();
        self.pose = step.pose;
        self.twist = step.twist;
        self.last_stamp = Some(pair.stamp);

        let status = if step.suppressed {
            UpdateStatus::HeadingSuppressed
        } else {
            UpdateStatus::Integrated
        };

        if self.config.debug_mode {
            tracing::info!(
                pair_id = pair.pair_id,
                dt,
                left_delta = left.delta,
                right_delta = right.delta,
                dtheta = step.displacement.dtheta,
                x = self.pose.x,
                y = self.pose.y,
                theta = self.pose.theta,
                status = status.as_str(),
                "odometry updated"
            );
        } else {
            tracing::trace!(
                pair_id = pair.pair_id,
                dt,
                x = self.pose.x,
                y = self.pose.y,
                theta = self.pose.theta,
                "odometry updated"
            );
        }

        let meta = self.meta(pair, status, dt, &left, &right);
        self.emit(pair.stamp, meta)
    }

    /// Current pose
    pub fn pose(&self) -> PoseEstimate {
        self.pose
    }

    /// Twist of the last integrated step
    pub fn twist(&self) -> Twist {
        self.twist
    }

    /// Stamp of the last accepted pair
    pub fn last_stamp(&self) -> Option<f64> {
        self.last_stamp
    }

    pub fn wheel_state(&self, side: WheelSide) -> &WheelState {
        match side {
            WheelSide::Left => self.left.state(),
            WheelSide::Right => self.right.state(),
        }
    }

    pub fn last_frame(&self) -> Option<&OdometryFrame> {
        self.last_frame.as_ref()
    }

    /// Total path length travelled by the body (m)
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Back to the freshly constructed state
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.publisher.reset();
        self.pose = PoseEstimate::default();
        self.twist = Twist::default();
        self.last_stamp = None;
        self.last_frame = None;
        self.distance = 0.0;
    }

    fn seed(&mut self, pair: &ImcoderPair) -> OdometryFrame {
        let left = self.left.observe(&pair.left.orientation);
        let right = self.right.observe(&pair.right.orientation);
        self.warn_degenerate(pair, &left, &right);

        self.left.commit(&left, pair.left.timestamp);
        self.right.commit(&right, pair.right.timestamp);
        self.twist = Twist::default();
        self.last_stamp = Some(pair.stamp);

        tracing::debug!(pair_id = pair.pair_id, stamp = pair.stamp, "wheel references seeded");

        let meta = self.meta(pair, UpdateStatus::Seeded, 0.0, &left, &right);
        self.emit(pair.stamp, meta)
    }

    fn reseed(&mut self, pair: &ImcoderPair, dt: f64) -> OdometryFrame {
        let left_ok = self.left.reseed(&pair.left.orientation, pair.left.timestamp);
        let right_ok = self.right.reseed(&pair.right.orientation, pair.right.timestamp);
        self.twist = Twist::default();
        self.last_stamp = Some(pair.stamp);

        tracing::warn!(
            pair_id = pair.pair_id,
            dt,
            max_gap = self.config.max_gap_sec,
            "gap between pairs too long, wheel references reseeded"
        );
        metrics::counter!("imcoders_odometry_gaps_total").increment(1);

        let mut meta = EstimatorMeta {
            status: UpdateStatus::GapReseeded,
            pair_id: pair.pair_id,
            dt,
            skew: pair.skew(),
            ..self.cumulative_meta()
        };
        meta.degenerate_left = !left_ok;
        meta.degenerate_right = !right_ok;
        self.emit(pair.stamp, meta)
    }

    fn republish(&mut self, pair: &ImcoderPair, dt: f64) -> OdometryFrame {
        tracing::debug!(
            pair_id = pair.pair_id,
            stamp = pair.stamp,
            dt,
            "pair stamp did not advance, previous pose republished"
        );
        metrics::counter!("imcoders_odometry_timing_anomalies_total").increment(1);

        let meta = EstimatorMeta {
            status: UpdateStatus::NonPositiveDt,
            pair_id: pair.pair_id,
            dt,
            skew: pair.skew(),
            ..self.cumulative_meta()
        };

        match &self.last_frame {
            Some(previous) => OdometryFrame {
                meta,
                ..previous.clone()
            },
            None => {
                let stamp = self.last_stamp.unwrap_or(pair.stamp);
                self.emit(stamp, meta)
            }
        }
    }

    fn emit(&mut self, stamp: f64, meta: EstimatorMeta) -> OdometryFrame {
        let frame = self.publisher.publish(stamp, self.pose, self.twist, meta);
        self.last_frame = Some(frame.clone());
        frame
    }

    fn meta(
        &self,
        pair: &ImcoderPair,
        status: UpdateStatus,
        dt: f64,
        left: &AngleSample,
        right: &AngleSample,
    ) -> EstimatorMeta {
        EstimatorMeta {
            status,
            pair_id: pair.pair_id,
            dt,
            left_delta: left.delta,
            right_delta: right.delta,
            degenerate_left: left.degenerate,
            degenerate_right: right.degenerate,
            skew: pair.skew(),
            ..self.cumulative_meta()
        }
    }

    fn cumulative_meta(&self) -> EstimatorMeta {
        EstimatorMeta {
            left_cumulative: self.left.cumulative(),
            right_cumulative: self.right.cumulative(),
            ..EstimatorMeta::default()
        }
    }

    fn warn_degenerate(&self, pair: &ImcoderPair, left: &AngleSample, right: &AngleSample) {
        for (side, sample) in [(WheelSide::Left, left), (WheelSide::Right, right)] {
            if sample.degenerate {
                tracing::warn!(
                    side = %side,
                    pair_id = pair.pair_id,
                    orientation = ?pair.reading(side).orientation,
                    "degenerate orientation, wheel delta treated as zero"
                );
                metrics::counter!(
                    "imcoders_degenerate_orientations_total",
                    "side" => side.as_str()
                )
                .increment(1);
            }
        }
    }
}
