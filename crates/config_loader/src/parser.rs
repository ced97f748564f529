//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, OdomBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<OdomBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<OdomBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<OdomBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{IntegrationMethod, RotationAxis, SinkType};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
debug_mode = true
publish_tf = false

[frames]
odom_frame_id = "odom"
odom_child_frame_id = "base_footprint"

[topics]
odom_topic_name = "wheel/odom"
imcoder_left_topic_name = "imcoder/left"
imcoder_right_topic_name = "imcoder/right"

[kinematics]
wheel_radius = 0.075
wheel_separation = 0.42
dtheta_threshold = 0.002
rotation_axis = "roll"
integration = "exact_arc"

[sync]
tolerance_sec = 0.01
queue_size = 20

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert!(bp.debug_mode);
        assert!(!bp.publish_tf);
        assert_eq!(bp.frames.odom_child_frame_id, "base_footprint");
        assert_eq!(bp.topics.imcoder_right_topic_name, "imcoder/right");
        assert_eq!(bp.kinematics.rotation_axis, RotationAxis::Roll);
        assert_eq!(bp.kinematics.integration, IntegrationMethod::ExactArc);
        assert_eq!(bp.sync.queue_size, 20);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "kinematics": { "wheel_radius": 0.05, "wheel_separation": 0.3 },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().frames.odom_frame_id, "odom");
    }

    #[test]
    fn test_missing_geometry_is_parse_error() {
        let content = r#"
[kinematics]
wheel_radius = 0.05
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("wheel_separation"));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
