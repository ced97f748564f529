//! # Odometry
//!
//! Differential drive odometry from two wheel-mounted imcoders.
//!
//! Pipeline per matched pair:
//! - [`angle`]: spin delta of each wheel from consecutive orientations
//! - [`kinematics`]: wheel deltas to a planar pose update
//! - [`publisher`]: pose and twist to an `OdometryFrame`
//!
//! [`OdometryEstimator`] ties the three together and owns all mutable state.
//!
//! ## Example
//!
//! ```ignore
//! use odometry::OdometryEstimator;
//!
//! let mut estimator = OdometryEstimator::new(blueprint.to_estimator_config())?;
//! for pair in matcher.push(reading) {
//!     let frame = estimator.update(&pair);
//!     dispatcher_tx.send(frame).await?;
//! }
//! ```

pub mod angle;
mod estimator;
pub mod kinematics;
pub mod publisher;

pub use angle::{WheelAngleTracker, WheelState};
pub use estimator::OdometryEstimator;
pub use kinematics::{normalize_angle, DiffDriveKinematics, DiffDriveParams};
pub use publisher::OdometryPublisher;
