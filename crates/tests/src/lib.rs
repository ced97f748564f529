//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到估计器的合约测试
//! - 模拟 e2e 测试（mock imcoder -> 配对 -> 里程计 -> 分发）
//! - 配对确定性与回放一致性

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{IntegrationMethod, RotationAxis, SinkType};
    use odometry::OdometryEstimator;

    const EXAMPLE_TOML: &str = r#"
debug_mode = false
publish_tf = true

[frames]
odom_frame_id = "odom"
odom_child_frame_id = "base_link"

[topics]
odom_topic_name = "imcoders/odom"
imcoder_left_topic_name = "imcoder_left"
imcoder_right_topic_name = "imcoder_right"

[kinematics]
wheel_radius = 0.05
wheel_separation = 0.3
dtheta_threshold = 0.001
rotation_axis = "pitch"
integration = "midpoint"
max_gap_sec = 0.5

[sync]
tolerance_sec = 0.02
queue_size = 10

[[sinks]]
name = "log"
sink_type = "log"
"#;

    #[test]
    fn test_example_config_builds_estimator() {
        let blueprint = ConfigLoader::load_from_str(EXAMPLE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::Log);

        let config = blueprint.to_estimator_config();
        assert_eq!(config.rotation_axis, RotationAxis::Pitch);
        assert_eq!(config.integration, IntegrationMethod::Midpoint);
        assert_eq!(config.odom_topic_name, "imcoders/odom");

        let estimator = OdometryEstimator::new(config).unwrap();
        assert_eq!(estimator.pose(), contracts::PoseEstimate::default());
        assert!(estimator.last_frame().is_none());
    }

    #[test]
    fn test_example_config_json_round_trip() {
        let blueprint = ConfigLoader::load_from_str(EXAMPLE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(again.kinematics.wheel_radius, 0.05);
        assert_eq!(again.kinematics.dtheta_threshold, 0.001);
        assert_eq!(again.topics.imcoder_right_topic_name, "imcoder_right");
        assert_eq!(again.sync.tolerance_sec, 0.02);
    }

    #[test]
    fn test_bad_geometry_never_reaches_estimator() {
        let bad = EXAMPLE_TOML.replace("wheel_separation = 0.3", "wheel_separation = 0.0");
        let err = ConfigLoader::load_from_str(&bad, ConfigFormat::Toml).unwrap_err();
        assert!(err.is_config_error());

        let negative = EXAMPLE_TOML.replace("dtheta_threshold = 0.001", "dtheta_threshold = -1.0");
        assert!(ConfigLoader::load_from_str(&negative, ConfigFormat::Toml).is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::f64::consts::PI;
    use std::io::Write;
    use std::time::Duration;

    use approx::assert_relative_eq;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ImcoderPair, ImcoderReading, IntegrationMethod, MatcherConfig, OdomBlueprint,
        OdometryFrame, PoseEstimate, UpdateStatus, WheelSide,
    };
    use dispatcher::create_dispatcher;
    use ingestion::{
        BackpressureConfig, IngestionPipeline, MockImcoderConfig, MockImcoderSource, Recording,
    };
    use observability::OdometryMetricsAggregator;
    use odometry::OdometryEstimator;
    use sync_engine::PairMatcher;
    use tokio::sync::mpsc;

    fn blueprint(extra: &str) -> OdomBlueprint {
        let toml = format!(
            "[kinematics]\nwheel_radius = 0.05\nwheel_separation = 0.3\ndtheta_threshold = 0.001\n{extra}"
        );
        ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap()
    }

    fn wheel(side: WheelSide, angular_rate: f64) -> MockImcoderConfig {
        MockImcoderConfig {
            side,
            frequency_hz: 50.0,
            angular_rate,
            paced: false,
            ..Default::default()
        }
    }

    /// Readings of both wheels, merged tick by tick (left first)
    fn lockstep_readings(left_rate: f64, right_rate: f64, ticks: u64) -> Vec<ImcoderReading> {
        let left = wheel(WheelSide::Left, left_rate);
        let right = wheel(WheelSide::Right, right_rate);
        (0..ticks)
            .flat_map(|k| [left.reading_at(k), right.reading_at(k)])
            .collect()
    }

    fn run_lockstep(
        blueprint: &OdomBlueprint,
        readings: &[ImcoderReading],
    ) -> (OdometryEstimator, Vec<OdometryFrame>) {
        let mut matcher = PairMatcher::new(blueprint.to_matcher_config());
        let mut estimator = OdometryEstimator::new(blueprint.to_estimator_config()).unwrap();

        let mut pairs = Vec::new();
        for reading in readings {
            pairs.extend(matcher.push(*reading));
        }
        pairs.extend(matcher.flush());

        let frames = pairs.iter().map(|pair| estimator.update(pair)).collect();
        (estimator, frames)
    }

    /// End-to-end test: MockImcoderSource -> IngestionPipeline -> PairMatcher
    /// -> OdometryEstimator -> Dispatcher (log + file sinks)
    ///
    /// 验证完整的数据流：直线行驶 x ≈ r·ω·t，theta 保持为 0。
    #[tokio::test]
    async fn test_e2e_mock_straight_drive() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = blueprint(&format!(
            r#"
[[sinks]]
name = "log"
sink_type = "log"
queue_capacity = 256

[[sinks]]
name = "files"
sink_type = "file"
queue_capacity = 256
params = {{ base_path = "{}" }}
"#,
            dir.path().display()
        ));

        // Source threads race each other; keep every reading until its partner shows up
        let mut matcher = PairMatcher::new(MatcherConfig {
            queue_size: 256,
            max_age_sec: 10.0,
            ..blueprint.to_matcher_config()
        });
        let mut estimator = OdometryEstimator::new(blueprint.to_estimator_config()).unwrap();
        let mut aggregator = OdometryMetricsAggregator::new();

        let ticks = 101u64;
        let mut ingestion = IngestionPipeline::with_config(BackpressureConfig::blocking(16));
        for side in [WheelSide::Left, WheelSide::Right] {
            let config = MockImcoderConfig {
                max_readings: Some(ticks),
                ..wheel(side, 2.0)
            };
            let source = MockImcoderSource::new(format!("imcoder_{side}"), config).unwrap();
            ingestion.register_source(Box::new(source), None);
        }

        let (frame_tx, frame_rx) = mpsc::channel::<OdometryFrame>(32);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), frame_rx)
            .await
            .unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        let dispatcher_handle = dispatcher.spawn();

        ingestion.start_all();
        let rx = ingestion.take_receiver().unwrap();

        let consume = async {
            for _ in 0..ticks * 2 {
                let reading = rx.recv().await.unwrap();
                for pair in matcher.push(reading) {
                    let frame = estimator.update(&pair);
                    aggregator.update(&frame);
                    frame_tx.send(frame).await.unwrap();
                }
            }
            assert!(matcher.flush().is_empty());
        };
        let result = tokio::time::timeout(Duration::from_secs(5), consume).await;
        assert!(result.is_ok(), "Pipeline timed out");

        ingestion.stop_all();
        let ingested = ingestion.metrics().snapshot();
        assert_eq!(ingested.total_received(), ticks * 2);
        assert_eq!(ingested.readings_dropped, 0);

        // Close frame channel to shutdown dispatcher
        drop(frame_tx);
        let report = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
            .await
            .expect("Dispatcher timed out")
            .unwrap();

        // 2 rad/s for 2 s on a 5 cm wheel
        let pose = estimator.pose();
        assert_relative_eq!(pose.x, 0.2, epsilon = 1e-6);
        assert!(pose.y.abs() < 1e-12);
        assert_eq!(pose.theta, 0.0);
        assert_relative_eq!(estimator.distance(), 0.2, epsilon = 1e-6);

        assert_eq!(aggregator.total_frames, ticks);
        assert_eq!(aggregator.count(UpdateStatus::Seeded), 1);
        assert_eq!(aggregator.count(UpdateStatus::HeadingSuppressed), ticks - 1);
        let summary = aggregator.summary();
        assert_relative_eq!(summary.linear_velocity.mean, 0.1, epsilon = 1e-6);

        assert_eq!(report.frames, ticks);
        for (name, snapshot) in &report.sinks {
            assert_eq!(snapshot.write_count, ticks, "sink {name}");
            assert_eq!(snapshot.last_seq, Some(ticks - 1), "sink {name}");
        }

        let odom = std::fs::read_to_string(dir.path().join("imcoders_odom.jsonl")).unwrap();
        let lines: Vec<_> = odom.lines().collect();
        assert_eq!(lines.len() as u64, ticks);
        let last: serde_json::Value = serde_json::from_str(lines[lines.len() - 1]).unwrap();
        assert_relative_eq!(last["pose"]["x"].as_f64().unwrap(), 0.2, epsilon = 1e-6);
        assert_eq!(last["child_frame_id"], "base_link");

        let tf = std::fs::read_to_string(dir.path().join("tf.jsonl")).unwrap();
        assert_eq!(tf.lines().count() as u64, ticks);
    }

    /// Same streams, both dispatch orders: identical pairs and poses
    #[test]
    fn test_matcher_determinism_across_arrival_orders() {
        let blueprint = blueprint("");
        let left_cfg = wheel(WheelSide::Left, 2.0);
        let right_cfg = wheel(WheelSide::Right, 2.5);

        let ticks: Vec<(ImcoderReading, Option<ImcoderReading>)> = (0..60u64)
            .map(|k| {
                let mut left = left_cfg.reading_at(k);
                left.timestamp += ((k * 7) % 5) as f64 * 0.001;
                // Right wheel drops reading 13
                let right = (k != 13).then(|| {
                    let mut right = right_cfg.reading_at(k);
                    right.timestamp += 0.004 + ((k * 3) % 4) as f64 * 0.001;
                    right
                });
                (left, right)
            })
            .collect();

        let run = |right_first: bool| -> (Vec<ImcoderPair>, Vec<PoseEstimate>) {
            let mut matcher = PairMatcher::new(blueprint.to_matcher_config());
            let mut pairs = Vec::new();
            for (k, (left, right)) in ticks.iter().enumerate() {
                let mut order = vec![*left];
                if k == 20 {
                    order.push(*left);
                }
                if let Some(right) = right {
                    if right_first {
                        order.insert(0, *right);
                    } else {
                        order.push(*right);
                    }
                }
                for reading in order {
                    pairs.extend(matcher.push(reading));
                }
            }
            pairs.extend(matcher.flush());

            let mut estimator = OdometryEstimator::new(blueprint.to_estimator_config()).unwrap();
            let poses = pairs.iter().map(|p| estimator.update(p).odom.pose).collect();
            (pairs, poses)
        };

        let (pairs_a, poses_a) = run(false);
        let (pairs_b, poses_b) = run(true);

        assert_eq!(pairs_a, pairs_b);
        assert_eq!(poses_a, poses_b);
        assert!(pairs_a.len() >= 55, "only {} pairs", pairs_a.len());

        let tolerance = blueprint.sync.tolerance_sec;
        for pair in &pairs_a {
            assert!(pair.skew() <= tolerance, "pair {} skew {}", pair.pair_id, pair.skew());
        }
        for window in pairs_a.windows(2) {
            assert!(window[1].stamp > window[0].stamp);
        }
    }

    /// Constant-curvature drive recorded to JSONL and replayed in lockstep
    #[test]
    fn test_replay_recording_follows_arc() {
        let readings = lockstep_readings(1.0, 2.0, 51);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# left 1 rad/s, right 2 rad/s, 50 Hz").unwrap();
        for reading in &readings {
            writeln!(file, "{}", serde_json::to_string(reading).unwrap()).unwrap();
        }
        file.flush().unwrap();

        let recording = Recording::load(file.path()).unwrap();
        assert_eq!(recording.len(), 102);
        assert_relative_eq!(recording.span(), 1.0, epsilon = 1e-12);

        // v = r (wl + wr) / 2, w = r (wr - wl) / L
        let v = 0.05 * 1.5;
        let w = 0.05 * 1.0 / 0.3;
        let radius = v / w;

        for (method, epsilon) in [
            (IntegrationMethod::Midpoint, 1e-6),
            (IntegrationMethod::ExactArc, 1e-9),
        ] {
            let mut bp = blueprint("");
            bp.kinematics.integration = method;
            let (estimator, frames) = run_lockstep(&bp, recording.readings());

            assert_eq!(frames.len(), 51);
            assert!(frames[1..]
                .iter()
                .all(|f| f.meta.status == UpdateStatus::Integrated));

            let pose = estimator.pose();
            assert_relative_eq!(pose.theta, w, epsilon = 1e-9);
            assert_relative_eq!(pose.x, radius * w.sin(), epsilon = epsilon);
            assert_relative_eq!(pose.y, radius * (1.0 - w.cos()), epsilon = epsilon);

            let twist = estimator.twist();
            assert_relative_eq!(twist.linear, v, epsilon = 1e-6);
            assert_relative_eq!(twist.angular, w, epsilon = 1e-6);
        }
    }

    /// Spin in place past +pi: heading wraps into the negative range
    #[test]
    fn test_pure_rotation_wraps_heading() {
        // 3 rad/s opposite wheel spin turns the body at 1 rad/s
        let readings = lockstep_readings(-3.0, 3.0, 201);
        let (estimator, frames) = run_lockstep(&blueprint(""), &readings);

        assert_eq!(frames.len(), 201);
        let mut wrapped = false;
        for window in frames.windows(2) {
            let (prev, next) = (window[0].odom.pose.theta, window[1].odom.pose.theta);
            assert!(next > -PI && next <= PI);
            if prev > 3.0 && next < -3.0 {
                wrapped = true;
            }
        }
        assert!(wrapped, "heading never crossed +pi");

        let pose = estimator.pose();
        assert_relative_eq!(pose.theta, 4.0 - 2.0 * PI, epsilon = 1e-9);
        assert!(pose.x.abs() < 1e-9 && pose.y.abs() < 1e-9);
        assert_relative_eq!(estimator.twist().angular, 1.0, epsilon = 1e-6);
    }

    /// A stalled sensor stream leaves a gap: references reseed, pose holds
    #[test]
    fn test_stream_gap_reseeds() {
        let mut readings = lockstep_readings(2.0, 2.0, 10);
        // One second of silence, wheels kept turning meanwhile
        let left = wheel(WheelSide::Left, 2.0);
        let right = wheel(WheelSide::Right, 2.0);
        readings.extend((60..70).flat_map(|k| [left.reading_at(k), right.reading_at(k)]));

        let (estimator, frames) = run_lockstep(&blueprint(""), &readings);

        assert_eq!(frames.len(), 20);
        assert_eq!(frames[10].meta.status, UpdateStatus::GapReseeded);
        assert_eq!(frames[10].odom.pose, frames[9].odom.pose);

        // 9 + 9 integrated steps of 0.04 rad each
        assert_relative_eq!(estimator.pose().x, 0.05 * 0.04 * 18.0, epsilon = 1e-9);
    }
}
