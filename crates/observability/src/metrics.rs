//! 里程计指标收集模块
//!
//! 基于 `OdometryFrame` / `MatcherStats` 记录 Prometheus 指标，并在内存中
//! 聚合运行统计。

use std::collections::BTreeMap;
use std::fmt;

use contracts::{MatcherStats, OdometryFrame, PoseEstimate, UpdateStatus, WheelSide};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 注册指标描述（安装 recorder 之后调用一次）
pub fn describe_metrics() {
    describe_counter!("imcoders_frames_total", "Odometry frames produced, by update status");
    describe_gauge!("imcoders_pose_x_meters", "Current x position in the odom frame");
    describe_gauge!("imcoders_pose_y_meters", "Current y position in the odom frame");
    describe_gauge!("imcoders_pose_theta_radians", "Current heading in the odom frame");
    describe_histogram!("imcoders_linear_velocity_mps", "Linear velocity per frame");
    describe_histogram!("imcoders_angular_velocity_radps", "Angular velocity per frame");
    describe_histogram!("imcoders_update_dt_ms", "Time between consecutive accepted pairs");
    describe_counter!("imcoders_readings_received_total", "Imcoder readings received, by side");
    describe_counter!("imcoders_frames_dispatched_total", "Frames delivered to sinks, by status");
    describe_gauge!("imcoders_matcher_queue_depth", "Readings buffered in the pair matcher");
    describe_counter!("imcoders_pairs_total", "Synchronized pairs emitted by the matcher");
    describe_counter!("imcoders_readings_dropped_total", "Readings dropped by the matcher, by reason");
}

/// 从 OdometryFrame 记录指标
///
/// 每产生一帧里程计调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_odometry_metrics;
///
/// for pair in matcher.push(reading) {
///     let frame = estimator.update(&pair);
///     record_odometry_metrics(&frame);
/// }
/// ```
pub fn record_odometry_metrics(frame: &OdometryFrame) {
    let odom = &frame.odom;

    counter!("imcoders_frames_total", "status" => frame.meta.status.as_str()).increment(1);
    gauge!("imcoders_last_seq").set(odom.seq as f64);

    // 位姿
    gauge!("imcoders_pose_x_meters").set(odom.pose.x);
    gauge!("imcoders_pose_y_meters").set(odom.pose.y);
    gauge!("imcoders_pose_theta_radians").set(odom.pose.theta);

    // 仅对真正积分过的帧统计速度和时间间隔
    if frame.meta.status.advanced_pose() {
        histogram!("imcoders_linear_velocity_mps").record(odom.twist.linear);
        histogram!("imcoders_angular_velocity_radps").record(odom.twist.angular);
        histogram!("imcoders_update_dt_ms").record(frame.meta.dt * 1000.0);
    }

    histogram!("imcoders_pair_skew_ms").record(frame.meta.skew.abs() * 1000.0);

    if frame.meta.degenerate_left {
        counter!("imcoders_frames_degenerate_total", "side" => WheelSide::Left.as_str())
            .increment(1);
    }
    if frame.meta.degenerate_right {
        counter!("imcoders_frames_degenerate_total", "side" => WheelSide::Right.as_str())
            .increment(1);
    }
}

/// 记录 imcoder 读数接收
pub fn record_reading_received(side: WheelSide) {
    counter!("imcoders_readings_received_total", "side" => side.as_str()).increment(1);
}

/// 记录里程计帧分发
pub fn record_frame_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "imcoders_frames_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录匹配器队列深度
pub fn record_matcher_stats(stats: &MatcherStats) {
    gauge!("imcoders_matcher_queue_depth", "side" => WheelSide::Left.as_str())
        .set(stats.left_depth as f64);
    gauge!("imcoders_matcher_queue_depth", "side" => WheelSide::Right.as_str())
        .set(stats.right_depth as f64);
    gauge!("imcoders_matcher_dropped_current").set(stats.total_dropped() as f64);
}

/// 里程计指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct OdometryMetricsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// 各状态帧数
    pub status_counts: BTreeMap<&'static str, u64>,

    /// 含退化姿态的帧数
    pub degenerate_frames: u64,

    /// 行驶路程 (m)
    pub distance: f64,

    /// Δt 统计 (ms)
    pub dt_stats: RunningStats,

    /// 线速度统计 (m/s)
    pub linear_stats: RunningStats,

    /// 角速度统计 (rad/s)
    pub angular_stats: RunningStats,

    /// 左右时间差统计 (ms)
    pub skew_stats: RunningStats,

    /// 最新位姿
    pub last_pose: Option<PoseEstimate>,

    /// 最新时间戳
    pub last_timestamp: Option<f64>,
}

impl OdometryMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, frame: &OdometryFrame) {
        let meta = &frame.meta;
        let pose = frame.odom.pose;

        self.total_frames += 1;
        *self.status_counts.entry(meta.status.as_str()).or_insert(0) += 1;

        if meta.degenerate_left || meta.degenerate_right {
            self.degenerate_frames += 1;
        }

        if meta.status.advanced_pose() {
            self.dt_stats.push(meta.dt * 1000.0);
            self.linear_stats.push(frame.odom.twist.linear);
            self.angular_stats.push(frame.odom.twist.angular);
        }
        self.skew_stats.push(meta.skew.abs() * 1000.0);

        if let Some(previous) = self.last_pose {
            self.distance += previous.distance_to(&pose);
        }
        self.last_pose = Some(pose);
        self.last_timestamp = Some(frame.odom.timestamp);
    }

    /// 某状态的帧数
    pub fn count(&self, status: UpdateStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> OdometrySummary {
        OdometrySummary {
            total_frames: self.total_frames,
            status_counts: self.status_counts.clone(),
            degenerate_frames: self.degenerate_frames,
            distance: self.distance,
            final_pose: self.last_pose,
            dt_ms: StatsSummary::from(&self.dt_stats),
            linear_velocity: StatsSummary::from(&self.linear_stats),
            angular_velocity: StatsSummary::from(&self.angular_stats),
            skew_ms: StatsSummary::from(&self.skew_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct OdometrySummary {
    pub total_frames: u64,
    pub status_counts: BTreeMap<&'static str, u64>,
    pub degenerate_frames: u64,
    pub distance: f64,
    pub final_pose: Option<PoseEstimate>,
    pub dt_ms: StatsSummary,
    pub linear_velocity: StatsSummary,
    pub angular_velocity: StatsSummary,
    pub skew_ms: StatsSummary,
}

impl fmt::Display for OdometrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Odometry Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        for (status, count) in &self.status_counts {
            writeln!(f, "  {}: {}", status, count)?;
        }
        writeln!(f, "Frames with degenerate orientation: {}", self.degenerate_frames)?;
        writeln!(f, "Distance travelled: {:.3} m", self.distance)?;
        match self.final_pose {
            Some(pose) => writeln!(
                f,
                "Final pose: x={:.3} y={:.3} theta={:.4}",
                pose.x, pose.y, pose.theta
            )?,
            None => writeln!(f, "Final pose: N/A")?,
        }
        writeln!(f, "Update dt (ms): {}", self.dt_ms)?;
        writeln!(f, "Linear velocity (m/s): {}", self.linear_velocity)?;
        writeln!(f, "Angular velocity (rad/s): {}", self.angular_velocity)?;
        writeln!(f, "Pair skew (ms): {}", self.skew_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{diagonal_covariance, EstimatorMeta, OdometryRecord, Quaternion, Twist};

    fn frame(seq: u64, x: f64, status: UpdateStatus) -> OdometryFrame {
        OdometryFrame {
            topic: "imcoders/odom".into(),
            odom: OdometryRecord {
                seq,
                timestamp: seq as f64 * 0.1,
                frame_id: "odom".into(),
                child_frame_id: "base_link".into(),
                pose: PoseEstimate::new(x, 0.0, 0.0),
                orientation: Quaternion::IDENTITY,
                pose_covariance: diagonal_covariance([0.0; 6]),
                twist: Twist {
                    linear: 1.0,
                    angular: 0.0,
                },
                twist_covariance: diagonal_covariance([0.0; 6]),
            },
            transform: None,
            meta: EstimatorMeta {
                status,
                dt: 0.1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = OdometryMetricsAggregator::new();
        aggregator.update(&frame(0, 0.0, UpdateStatus::Seeded));
        aggregator.update(&frame(1, 0.1, UpdateStatus::HeadingSuppressed));
        aggregator.update(&frame(2, 0.1, UpdateStatus::NonPositiveDt));
        aggregator.update(&frame(3, 0.3, UpdateStatus::Integrated));

        assert_eq!(aggregator.total_frames, 4);
        assert_eq!(aggregator.count(UpdateStatus::NonPositiveDt), 1);
        assert_eq!(aggregator.count(UpdateStatus::GapReseeded), 0);
        // Only frames that moved the pose feed the velocity stats
        assert_eq!(aggregator.linear_stats.count(), 2);
        assert!((aggregator.distance - 0.3).abs() < 1e-12);
        assert!((aggregator.last_timestamp.unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = OdometryMetricsAggregator::new();
        aggregator.update(&frame(0, 0.0, UpdateStatus::Seeded));
        aggregator.update(&frame(1, 0.5, UpdateStatus::Integrated));

        let output = aggregator.summary().to_string();
        assert!(output.contains("Total frames: 2"));
        assert!(output.contains("integrated: 1"));
        assert!(output.contains("Distance travelled: 0.500 m"));
        assert!(output.contains("x=0.500"));
    }
}
