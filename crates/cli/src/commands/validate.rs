//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OdomBlueprint, SinkType};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    wheel_radius: f64,
    wheel_separation: f64,
    dtheta_threshold: f64,
    odom_topic: String,
    publish_tf: bool,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    // Check file exists
    if !path.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", path.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(path) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    wheel_radius: blueprint.kinematics.wheel_radius,
                    wheel_separation: blueprint.kinematics.wheel_separation,
                    dtheta_threshold: blueprint.kinematics.dtheta_threshold,
                    odom_topic: blueprint.topics.odom_topic_name.clone(),
                    publish_tf: blueprint.publish_tf,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &OdomBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - odometry frames will be dropped".to_string());
    }

    if blueprint.kinematics.dtheta_threshold == 0.0 {
        warnings.push(
            "kinematics.dtheta_threshold is 0 - heading noise is never suppressed".to_string(),
        );
    }

    if blueprint.sync.tolerance_sec >= blueprint.kinematics.max_gap_sec {
        warnings.push(format!(
            "sync.tolerance_sec ({}) >= kinematics.max_gap_sec ({}) - matched pairs may straddle a reseed gap",
            blueprint.sync.tolerance_sec, blueprint.kinematics.max_gap_sec
        ));
    }

    for sink in &blueprint.sinks {
        if sink.sink_type == SinkType::File && !sink.params.contains_key("base_path") {
            warnings.push(format!(
                "File sink '{}' has no base_path - writing to ./output",
                sink.name
            ));
        }
    }

    if blueprint.debug_mode {
        warnings.push("debug_mode is enabled - expect verbose per-pair logging".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Wheel radius: {} m", summary.wheel_radius);
            println!("  Wheel separation: {} m", summary.wheel_separation);
            println!("  dtheta threshold: {} rad", summary.dtheta_threshold);
            println!("  Odometry topic: {}", summary.odom_topic);
            println!("  Publish tf: {}", summary.publish_tf);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = config_file(
            r#"
[kinematics]
wheel_radius = 0.05
wheel_separation = 0.3

[[sinks]]
name = "out"
sink_type = "file"
"#,
        );

        let result = validate_config(file.path());
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("dtheta_threshold")));
        assert!(warnings.iter().any(|w| w.contains("base_path")));
        assert_eq!(result.summary.unwrap().sink_count, 1);
    }

    #[test]
    fn test_invalid_geometry() {
        let file = config_file("[kinematics]\nwheel_radius = -0.05\nwheel_separation = 0.3\n");

        let result = validate_config(file.path());
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("wheel_radius"));
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(Path::new("/nonexistent/odom.toml"));
        assert!(!result.valid);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], false);
        assert!(json.get("summary").is_none());
    }
}
