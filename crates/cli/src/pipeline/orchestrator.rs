//! Pipeline orchestrator - coordinates all components.
//!
//! Readings flow `ReadingSource`s -> `IngestionPipeline` -> `PairMatcher` ->
//! `OdometryEstimator` -> `Dispatcher`. The matcher and the estimator are
//! owned by the pipeline task, so every pair is processed to completion
//! before the next reading is taken from the channel.
//!
//! A replay at speed 0 skips the ingestion threads and feeds the merged
//! recording straight into the matcher, which makes the output independent
//! of thread scheduling.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ImcoderPair, ImcoderReading, OdomBlueprint, OdometryFrame, WheelSide};
use ingestion::{
    BackpressureConfig, IngestionError, IngestionPipeline, MockImcoderConfig, MockImcoderSource,
    Recording, ReplayConfig, ReplaySource,
};
use observability::{record_matcher_stats, record_odometry_metrics, record_reading_received};
use odometry::OdometryEstimator;
use sync_engine::PairMatcher;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{PipelineStats, StopReason};
use crate::error::CliError;

/// How long the dispatcher gets to drain its sinks at shutdown
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the streamed loop checks whether all sources have finished
const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Readings between two matcher gauge updates
const MATCHER_STATS_EVERY: u64 = 100;

/// Constant wheel rates of the simulated robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockMotion {
    /// Left wheel spin rate (rad/s)
    pub left_rate: f64,
    /// Right wheel spin rate (rad/s)
    pub right_rate: f64,
    /// Publish frequency of each wheel (Hz)
    pub frequency_hz: f64,
    /// Stamp offset of the right wheel (s)
    pub skew_sec: f64,
}

/// Where readings come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Mock(MockMotion),
    Replay {
        path: PathBuf,
        /// 0 = lockstep, as fast as possible
        speed: f64,
        loop_playback: bool,
    },
}

impl SourceSpec {
    /// Short description for logs and statistics
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Mock(motion) => format!(
                "mock (left {} rad/s, right {} rad/s, {} Hz)",
                motion.left_rate, motion.right_rate, motion.frequency_hz
            ),
            SourceSpec::Replay { path, speed, .. } if *speed == 0.0 => {
                format!("replay {} (lockstep)", path.display())
            }
            SourceSpec::Replay { path, speed, .. } => {
                format!("replay {} (x{speed})", path.display())
            }
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated odometry configuration
    pub blueprint: OdomBlueprint,

    /// Reading source
    pub source: SourceSpec,

    /// Maximum number of odometry frames to produce (None = unlimited)
    pub max_frames: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Readings prepared before the run starts
enum Feed {
    /// Merged recording pushed straight into the matcher
    Lockstep(Recording),
    /// Source threads merged by the ingestion channel
    Streamed(IngestionPipeline),
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the sources end, a limit is hit, or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Everything that can fail on bad input happens before the first reading
        let estimator = OdometryEstimator::new(blueprint.to_estimator_config())
            .context("Invalid odometry configuration")?;
        let matcher = PairMatcher::new(blueprint.to_matcher_config());
        let feed = self.build_feed()?;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        info!(
            tolerance_ms = blueprint.sync.tolerance_sec * 1000.0,
            queue_size = blueprint.sync.queue_size,
            wheel_radius = blueprint.kinematics.wheel_radius,
            wheel_separation = blueprint.kinematics.wheel_separation,
            "Matcher and estimator configured"
        );

        // Setup Dispatcher
        let (frame_tx, frame_rx) = mpsc::channel::<OdometryFrame>(self.config.buffer_size.max(1));
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - odometry frames will be dropped");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), frame_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        let mut run = OdometryRun {
            matcher,
            estimator,
            frame_tx,
            max_frames: self.config.max_frames,
            stats: PipelineStats {
                source: self.config.source.describe(),
                active_sinks,
                ..Default::default()
            },
        };

        let mut shutdown = Box::pin(shutdown);
        let timeout = self.config.timeout;
        let mut deadline = Box::pin(async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        });

        info!(source = %run.stats.source, max_frames = ?self.config.max_frames, "Pipeline running");

        let reason = match feed {
            Feed::Lockstep(recording) => {
                run.stats.active_sources = 2;
                tokio::select! {
                    reason = run.replay_lockstep(&recording) => reason,
                    _ = &mut shutdown => StopReason::Signal,
                    _ = &mut deadline => StopReason::Timeout,
                }
            }
            Feed::Streamed(ingestion) => {
                run.stats.active_sources = ingestion.source_count();
                run.stream(ingestion, &mut shutdown, &mut deadline).await?
            }
        };

        match reason {
            StopReason::Signal => warn!("Received shutdown signal, stopping pipeline..."),
            StopReason::Timeout => warn!(timeout = ?timeout, "Pipeline timed out"),
            reason => info!(reason = %reason, "Pipeline input finished"),
        }

        // Readings still buffered in the matcher can pair up now
        if !matches!(reason, StopReason::MaxFrames | StopReason::DispatcherClosed) {
            let pairs = run.matcher.flush();
            run.process_pairs(pairs).await;
        }

        let mut stats = run.finish(reason);

        // Wait for dispatcher to flush
        info!("Shutting down dispatcher...");
        match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(report)) => {
                stats.frames_dispatched = report.frames;
                stats.sinks = report.sinks;
            }
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Timed out waiting for dispatcher to drain"),
        }

        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    /// Load the recording or create the sources
    fn build_feed(&self) -> Result<Feed> {
        let blueprint = &self.config.blueprint;
        let topics = &blueprint.topics;
        let sides = [
            (WheelSide::Left, topics.imcoder_left_topic_name.as_str()),
            (WheelSide::Right, topics.imcoder_right_topic_name.as_str()),
        ];

        match &self.config.source {
            SourceSpec::Replay {
                path,
                speed,
                loop_playback,
            } => {
                info!(path = %path.display(), speed, "Running in REPLAY mode");
                let recording = Recording::load(path)
                    .with_context(|| format!("Failed to load recording {}", path.display()))?;

                if *speed == 0.0 {
                    if *loop_playback {
                        warn!("--replay-loop is ignored in lockstep replay");
                    }
                    for (side, _) in sides {
                        if recording.side(side).is_empty() {
                            return Err(IngestionError::EmptyRecording {
                                path: path.clone(),
                                side: side.to_string(),
                            }
                            .into());
                        }
                    }
                    return Ok(Feed::Lockstep(recording));
                }

                // Replay is lossless: sources wait for the estimator
                let mut ingestion = IngestionPipeline::with_config(BackpressureConfig::blocking(
                    self.config.buffer_size,
                ));
                let replay_config = ReplayConfig {
                    speed_multiplier: *speed,
                    loop_playback: *loop_playback,
                };
                for (side, name) in sides {
                    let source = ReplaySource::new(name, side, &recording, replay_config.clone())
                        .with_context(|| format!("Failed to create replay source '{name}'"))?;
                    ingestion.register_source(Box::new(source), None);
                }
                Ok(Feed::Streamed(ingestion))
            }
            SourceSpec::Mock(motion) => {
                info!("Running in MOCK mode (simulated wheels)");
                let mut ingestion = IngestionPipeline::with_config(BackpressureConfig::new(
                    self.config.buffer_size,
                    blueprint.sync.drop_policy,
                ));
                for (side, name) in sides {
                    let (angular_rate, skew_sec) = match side {
                        WheelSide::Left => (motion.left_rate, 0.0),
                        WheelSide::Right => (motion.right_rate, motion.skew_sec),
                    };
                    let source = MockImcoderSource::new(
                        name,
                        MockImcoderConfig {
                            side,
                            frequency_hz: motion.frequency_hz,
                            angular_rate,
                            rotation_axis: blueprint.kinematics.rotation_axis,
                            skew_sec,
                            ..Default::default()
                        },
                    )
                    .with_context(|| format!("Failed to create mock source '{name}'"))?;
                    ingestion.register_source(Box::new(source), None);
                }
                Ok(Feed::Streamed(ingestion))
            }
        }
    }
}

/// State owned by the pipeline task while readings flow
struct OdometryRun {
    matcher: PairMatcher,
    estimator: OdometryEstimator,
    frame_tx: mpsc::Sender<OdometryFrame>,
    max_frames: Option<u64>,
    stats: PipelineStats,
}

impl OdometryRun {
    /// Merge the source threads through the ingestion channel
    async fn stream<S, D>(
        &mut self,
        mut ingestion: IngestionPipeline,
        shutdown: &mut S,
        deadline: &mut D,
    ) -> Result<StopReason>
    where
        S: Future<Output = ()> + Unpin,
        D: Future<Output = ()> + Unpin,
    {
        ingestion.start_all();
        let rx = ingestion
            .take_receiver()
            .ok_or_else(|| CliError::pipeline_execution("ingestion receiver already taken"))?;

        let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);

        let reason = loop {
            tokio::select! {
                _ = &mut *shutdown => break StopReason::Signal,
                _ = &mut *deadline => break StopReason::Timeout,
                received = rx.recv() => match received {
                    Ok(reading) => {
                        if let Some(reason) = self.push_reading(reading).await {
                            break reason;
                        }
                    }
                    Err(_) => break StopReason::SourcesExhausted,
                },
                _ = idle_check.tick() => {
                    if !ingestion.any_listening() && rx.is_empty() {
                        break StopReason::SourcesExhausted;
                    }
                }
            }
        };

        info!("Stopping imcoder sources...");
        rx.close();
        ingestion.stop_all();
        self.stats.ingestion = Some(ingestion.metrics().snapshot());

        Ok(reason)
    }

    /// Push the whole recording through the matcher in stamp order
    async fn replay_lockstep(&mut self, recording: &Recording) -> StopReason {
        for (i, reading) in recording.readings().iter().enumerate() {
            if let Some(reason) = self.push_reading(*reading).await {
                return reason;
            }
            // Let the dispatcher and the signal handler run
            if i % 256 == 255 {
                tokio::task::yield_now().await;
            }
        }
        StopReason::SourcesExhausted
    }

    /// Feed one reading; returns why the run must stop, if it must
    async fn push_reading(&mut self, reading: ImcoderReading) -> Option<StopReason> {
        self.stats.readings_received += 1;
        record_reading_received(reading.side);

        let pairs = self.matcher.push(reading);
        if self.stats.readings_received % MATCHER_STATS_EVERY == 0 {
            record_matcher_stats(&self.matcher.stats());
        }

        self.process_pairs(pairs).await
    }

    async fn process_pairs(&mut self, pairs: Vec<ImcoderPair>) -> Option<StopReason> {
        for pair in pairs {
            if self.limit_reached() {
                break;
            }

            let frame = self.estimator.update(&pair);
            record_odometry_metrics(&frame);
            self.stats.odometry.update(&frame);
            self.stats.frames_published += 1;

            debug!(
                seq = frame.seq(),
                pair_id = pair.pair_id,
                t = format!("{:.3}", frame.timestamp()),
                x = format!("{:.4}", frame.odom.pose.x),
                y = format!("{:.4}", frame.odom.pose.y),
                theta = format!("{:.4}", frame.odom.pose.theta),
                status = frame.meta.status.as_str(),
                "Odometry frame produced"
            );

            if self.frame_tx.send(frame).await.is_err() {
                warn!("Dispatcher channel closed");
                return Some(StopReason::DispatcherClosed);
            }
        }

        if self.limit_reached() {
            info!(frames = self.stats.frames_published, "Reached max frames limit");
            return Some(StopReason::MaxFrames);
        }
        None
    }

    fn limit_reached(&self) -> bool {
        self.max_frames
            .is_some_and(|max| self.stats.frames_published >= max)
    }

    /// Close the frame channel and collect the run statistics
    fn finish(self, reason: StopReason) -> PipelineStats {
        let OdometryRun {
            matcher,
            frame_tx,
            mut stats,
            ..
        } = self;
        drop(frame_tx);

        stats.matcher = matcher.stats();
        record_matcher_stats(&stats.matcher);
        stats.stop_reason = reason;
        stats
    }
}
