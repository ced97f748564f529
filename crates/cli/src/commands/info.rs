//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{FrameConfig, KinematicsConfig, OdomBlueprint, TopicConfig};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    debug_mode: bool,
    publish_tf: bool,
    frames: &'a FrameConfig,
    topics: &'a TopicConfig,
    kinematics: &'a KinematicsConfig,
    sync_settings: SyncInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

/// Effective matcher settings (defaults resolved)
#[derive(Serialize)]
struct SyncInfo {
    tolerance_sec: f64,
    queue_size: usize,
    max_wait_sec: f64,
    max_age_sec: f64,
    drop_policy: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.sinks);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.sinks);
    }

    Ok(())
}

fn build_config_info(blueprint: &OdomBlueprint, sink_params: bool) -> ConfigInfo<'_> {
    let matcher = blueprint.to_matcher_config();

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            queue_capacity: s.queue_capacity,
            params: if sink_params {
                s.params.clone()
            } else {
                HashMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        debug_mode: blueprint.debug_mode,
        publish_tf: blueprint.publish_tf,
        frames: &blueprint.frames,
        topics: &blueprint.topics,
        kinematics: &blueprint.kinematics,
        sync_settings: SyncInfo {
            tolerance_sec: matcher.tolerance_sec,
            queue_size: matcher.queue_size,
            max_wait_sec: matcher.max_wait_sec,
            max_age_sec: matcher.max_age_sec,
            drop_policy: format!("{:?}", blueprint.sync.drop_policy),
        },
        sinks,
    }
}

fn print_config_info(blueprint: &OdomBlueprint, sink_params: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               imcoders-odom Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 General");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Debug mode: {}", blueprint.debug_mode);
    println!("   └─ Publish tf: {}", blueprint.publish_tf);

    let k = &blueprint.kinematics;
    println!("\n🛞 Kinematics");
    println!("   ├─ Wheel radius: {} m", k.wheel_radius);
    println!("   ├─ Wheel separation: {} m", k.wheel_separation);
    println!("   ├─ dtheta threshold: {} rad", k.dtheta_threshold);
    println!("   ├─ Rotation axis: {:?}", k.rotation_axis);
    println!("   ├─ Integration: {:?}", k.integration);
    println!("   └─ Max gap: {} s", k.max_gap_sec);

    println!("\n🧭 Frames & Topics");
    println!(
        "   ├─ Odometry: {} -> {}",
        blueprint.frames.odom_frame_id, blueprint.frames.odom_child_frame_id
    );
    println!("   ├─ Output topic: {}", blueprint.topics.odom_topic_name);
    println!("   ├─ Left imcoder: {}", blueprint.topics.imcoder_left_topic_name);
    println!("   └─ Right imcoder: {}", blueprint.topics.imcoder_right_topic_name);

    let matcher = blueprint.to_matcher_config();
    println!("\n⚙️  Sync Settings");
    println!("   ├─ Tolerance: {:.1} ms", matcher.tolerance_sec * 1000.0);
    println!("   ├─ Queue size: {}", matcher.queue_size);
    println!("   ├─ Max wait: {:.1} ms", matcher.max_wait_sec * 1000.0);
    println!("   ├─ Max age: {:.1} ms", matcher.max_age_sec * 1000.0);
    println!("   └─ Ingestion drop policy: {:?}", blueprint.sync.drop_policy);

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
            if sink_params {
                let mut params: Vec<_> = sink.params.iter().collect();
                params.sort();
                for (key, value) in params {
                    println!("   {}  {} = {}", child_prefix, key, value);
                }
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    const CONFIG: &str = r#"
publish_tf = false

[kinematics]
wheel_radius = 0.05
wheel_separation = 0.3
dtheta_threshold = 0.001

[sync]
tolerance_sec = 0.01

[[sinks]]
name = "files"
sink_type = "file"
params = { base_path = "/tmp/odom" }
"#;

    #[test]
    fn test_json_info() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();

        let json = serde_json::to_value(build_config_info(&blueprint, false)).unwrap();
        assert_eq!(json["publish_tf"], false);
        assert_eq!(json["kinematics"]["wheel_separation"], 0.3);
        assert_eq!(json["frames"]["odom_frame_id"], "odom");
        // max_wait defaults to 5x tolerance
        let max_wait = json["sync_settings"]["max_wait_sec"].as_f64().unwrap();
        assert!((max_wait - 0.05).abs() < 1e-12);
        assert_eq!(json["sinks"][0]["sink_type"], "File");
        assert!(json["sinks"][0].get("params").is_none());

        let json = serde_json::to_value(build_config_info(&blueprint, true)).unwrap();
        assert_eq!(json["sinks"][0]["params"]["base_path"], "/tmp/odom");
    }
}
