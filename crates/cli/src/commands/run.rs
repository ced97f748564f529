//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::OdomBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::{RunArgs, SourceKind};
use crate::error::CliError;
use crate::pipeline::{MockMotion, Pipeline, PipelineConfig, SourceSpec};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    let source = source_spec(args)?;

    info!(
        wheel_radius = blueprint.kinematics.wheel_radius,
        wheel_separation = blueprint.kinematics.wheel_separation,
        dtheta_threshold = blueprint.kinematics.dtheta_threshold,
        publish_tf = blueprint.publish_tf,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, &source);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        source,
        max_frames: if args.max_frames == 0 {
            None
        } else {
            Some(args.max_frames)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting pipeline...");

    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        frames = stats.frames_published,
        readings = stats.readings_received,
        stop_reason = %stats.stop_reason,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Pipeline completed"
    );

    stats.print_summary();

    info!("imcoders-odom finished");
    Ok(())
}

/// Command-line flags win over the configuration file
fn apply_overrides(blueprint: &mut OdomBlueprint, args: &RunArgs) {
    if let Some(publish_tf) = args.publish_tf_override() {
        info!(publish_tf, "Overriding publish_tf from CLI");
        blueprint.publish_tf = publish_tf;
    }
    if args.debug {
        info!("Enabling debug mode from CLI");
        blueprint.debug_mode = true;
    }
}

/// Resolve the reading source from the command line
fn source_spec(args: &RunArgs) -> Result<SourceSpec, CliError> {
    match args.source_kind() {
        SourceKind::Replay => {
            let path = args.replay.clone().ok_or_else(|| {
                CliError::invalid_arguments("--source replay requires --replay <file>")
            })?;
            if !(args.replay_speed.is_finite() && args.replay_speed >= 0.0) {
                return Err(CliError::invalid_arguments(format!(
                    "--replay-speed must be >= 0, got {}",
                    args.replay_speed
                )));
            }
            Ok(SourceSpec::Replay {
                path,
                speed: args.replay_speed,
                loop_playback: args.replay_loop,
            })
        }
        SourceKind::Mock => {
            if let Some(ref path) = args.replay {
                warn!(path = %path.display(), "--replay is ignored with --source mock");
            }
            if !(args.mock_frequency.is_finite() && args.mock_frequency > 0.0) {
                return Err(CliError::invalid_arguments(format!(
                    "--mock-frequency must be > 0, got {}",
                    args.mock_frequency
                )));
            }
            Ok(SourceSpec::Mock(MockMotion {
                left_rate: args.mock_left_rate,
                right_rate: args.mock_right_rate,
                frequency_hz: args.mock_frequency,
                skew_sec: args.mock_skew,
            }))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &OdomBlueprint, source: &SourceSpec) {
    let k = &blueprint.kinematics;
    println!("\n=== Configuration Summary ===\n");
    println!("Source: {}", source.describe());
    println!("\nKinematics:");
    println!("  Wheel radius: {} m", k.wheel_radius);
    println!("  Wheel separation: {} m", k.wheel_separation);
    println!("  dtheta threshold: {} rad", k.dtheta_threshold);
    println!("  Rotation axis: {:?}", k.rotation_axis);
    println!("  Integration: {:?}", k.integration);
    println!("  Max gap: {} s", k.max_gap_sec);

    println!("\nFrames:");
    println!(
        "  {} -> {} (topic {}, tf {})",
        blueprint.frames.odom_frame_id,
        blueprint.frames.odom_child_frame_id,
        blueprint.topics.odom_topic_name,
        if blueprint.publish_tf { "on" } else { "off" }
    );
    println!(
        "  Inputs: {} / {}",
        blueprint.topics.imcoder_left_topic_name, blueprint.topics.imcoder_right_topic_name
    );

    let matcher = blueprint.to_matcher_config();
    println!("\nSync Settings:");
    println!("  Tolerance: {:.1} ms", matcher.tolerance_sec * 1000.0);
    println!("  Queue size: {}", matcher.queue_size);
    println!("  Max wait: {:.1} ms", matcher.max_wait_sec * 1000.0);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
