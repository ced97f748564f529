//! OdomBlueprint - Config Loader output
//!
//! Complete node configuration: flags, frames, topics, kinematics, pair
//! matching and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{EstimatorConfig, IntegrationMethod, MatcherConfig, RotationAxis};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete node configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OdomBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Log every estimator update at info level
    #[serde(default)]
    pub debug_mode: bool,

    /// Emit the odom -> body transform
    #[serde(default = "default_publish_tf")]
    pub publish_tf: bool,

    #[serde(default)]
    #[validate(nested)]
    pub frames: FrameConfig,

    #[serde(default)]
    #[validate(nested)]
    pub topics: TopicConfig,

    /// Robot geometry and integration settings (required)
    #[validate(nested)]
    pub kinematics: KinematicsConfig,

    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig,

    /// Output routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

fn default_publish_tf() -> bool {
    true
}

/// Frame identifiers
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FrameConfig {
    /// Fixed odometry frame
    #[serde(default = "default_odom_frame_id")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub odom_frame_id: String,

    /// Robot body frame
    #[serde(default = "default_odom_child_frame_id")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub odom_child_frame_id: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            odom_frame_id: default_odom_frame_id(),
            odom_child_frame_id: default_odom_child_frame_id(),
        }
    }
}

fn default_odom_frame_id() -> String {
    "odom".to_string()
}

fn default_odom_child_frame_id() -> String {
    "base_link".to_string()
}

/// Topic names
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TopicConfig {
    /// Odometry output topic
    #[serde(default = "default_odom_topic_name")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub odom_topic_name: String,

    /// Left imcoder input topic
    #[serde(default = "default_left_topic_name")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub imcoder_left_topic_name: String,

    /// Right imcoder input topic
    #[serde(default = "default_right_topic_name")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub imcoder_right_topic_name: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            odom_topic_name: default_odom_topic_name(),
            imcoder_left_topic_name: default_left_topic_name(),
            imcoder_right_topic_name: default_right_topic_name(),
        }
    }
}

fn default_odom_topic_name() -> String {
    "imcoders/odom".to_string()
}

fn default_left_topic_name() -> String {
    "imcoder_left".to_string()
}

fn default_right_topic_name() -> String {
    "imcoder_right".to_string()
}

/// Robot geometry and integration settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KinematicsConfig {
    /// Wheel radius r (m), must be > 0
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub wheel_radius: f64,

    /// Track width L (m), must be > 0
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub wheel_separation: f64,

    /// Minimum heading change treated as motion (rad), must be >= 0
    #[serde(default)]
    #[validate(range(min = 0.0, message = "must be >= 0"))]
    pub dtheta_threshold: f64,

    /// Axis the wheel spins about in the sensor frame
    #[serde(default)]
    pub rotation_axis: RotationAxis,

    #[serde(default)]
    pub integration: IntegrationMethod,

    /// Pairs further apart than this reseed instead of integrating (s)
    #[serde(default = "default_max_gap")]
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub max_gap_sec: f64,
}

fn default_max_gap() -> f64 {
    0.5
}

/// Pair matching configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Maximum left/right stamp difference (s)
    #[serde(default = "default_tolerance")]
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub tolerance_sec: f64,

    /// Buffered readings per side
    #[serde(default = "default_queue_size")]
    #[validate(range(min = 1, message = "must be >= 1"))]
    pub queue_size: usize,

    /// Partner lead after which a pivot is emitted without its successor (s).
    /// Defaults to five times the tolerance.
    #[serde(default)]
    pub max_wait_sec: Option<f64>,

    /// Buffering window (s)
    #[serde(default = "default_max_age")]
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub max_age_sec: f64,

    /// Ingestion backpressure policy
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_sec: default_tolerance(),
            queue_size: default_queue_size(),
            max_wait_sec: None,
            max_age_sec: default_max_age(),
            drop_policy: DropPolicy::default(),
        }
    }
}

fn default_tolerance() -> f64 {
    0.020 // 20ms
}

fn default_queue_size() -> usize {
    10
}

fn default_max_age() -> f64 {
    1.0
}

/// Drop policy when the ingestion channel is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Drop the oldest reading
    DropOldest,
    /// Drop the newest reading
    #[default]
    DropNewest,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "must be >= 1"))]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSONL file output
    File,
    /// UDP output
    Network,
}

impl OdomBlueprint {
    /// Build the pair matcher configuration
    pub fn to_matcher_config(&self) -> MatcherConfig {
        let tolerance_sec = self.sync.tolerance_sec;
        MatcherConfig {
            tolerance_sec,
            queue_size: self.sync.queue_size,
            max_wait_sec: self
                .sync
                .max_wait_sec
                .unwrap_or(tolerance_sec * 5.0)
                .max(tolerance_sec),
            max_age_sec: self.sync.max_age_sec,
        }
    }

    /// Build the estimator configuration
    pub fn to_estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            wheel_radius: self.kinematics.wheel_radius,
            wheel_separation: self.kinematics.wheel_separation,
            dtheta_threshold: self.kinematics.dtheta_threshold,
            rotation_axis: self.kinematics.rotation_axis,
            integration: self.kinematics.integration,
            max_gap_sec: self.kinematics.max_gap_sec,
            odom_frame_id: self.frames.odom_frame_id.clone(),
            odom_child_frame_id: self.frames.odom_child_frame_id.clone(),
            odom_topic_name: self.topics.odom_topic_name.clone(),
            publish_tf: self.publish_tf,
            debug_mode: self.debug_mode,
        }
    }
}
