//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (`validator` derive)：wheel_radius > 0, wheel_separation > 0,
//!   dtheta_threshold >= 0, frame/topic 名称非空, tolerance > 0
//! - 数值必须有限 (NaN / inf 不通过)
//! - 左右 imcoder topic 不同, odom topic 不与输入 topic 重名
//! - odom_frame_id 与 odom_child_frame_id 不同
//! - max_wait_sec >= tolerance_sec
//! - max_age_sec >= 实际生效的 max_wait_sec (未配置时为 5 × tolerance)
//! - sink 名称唯一, network sink 必须提供 addr

use std::collections::HashSet;

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, OdomBlueprint, SinkType};

/// 校验 OdomBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_finite(blueprint)?;
    validate_topics(blueprint)?;
    validate_frames(blueprint)?;
    validate_sync_config(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let Err(errors) = blueprint.validate() else {
        return Ok(());
    };

    let mut flat = Vec::new();
    flatten_errors("", &errors, &mut flat);
    flat.sort();

    match flat.into_iter().next() {
        Some((field, message)) => Err(ContractError::config_validation(field, message)),
        None => Err(ContractError::config_validation("<root>", errors.to_string())),
    }
}

/// 展开嵌套的 ValidationErrors 为 (字段路径, 信息)
fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    flatten_errors(&format!("{path}[{idx}]"), nested, out);
                }
            }
        }
    }
}

/// 数值必须有限
fn validate_finite(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let k = &blueprint.kinematics;
    let s = &blueprint.sync;
    let mut checks = vec![
        ("kinematics.wheel_radius", k.wheel_radius),
        ("kinematics.wheel_separation", k.wheel_separation),
        ("kinematics.dtheta_threshold", k.dtheta_threshold),
        ("kinematics.max_gap_sec", k.max_gap_sec),
        ("sync.tolerance_sec", s.tolerance_sec),
        ("sync.max_age_sec", s.max_age_sec),
    ];
    if let Some(max_wait) = s.max_wait_sec {
        checks.push(("sync.max_wait_sec", max_wait));
    }

    for (field, value) in checks {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite number, got {value}"),
            ));
        }
    }
    Ok(())
}

/// 校验 topic 名称
fn validate_topics(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let topics = &blueprint.topics;

    if topics.imcoder_left_topic_name == topics.imcoder_right_topic_name {
        return Err(ContractError::config_validation(
            "topics.imcoder_right_topic_name",
            format!(
                "left and right imcoders cannot share topic '{}'",
                topics.imcoder_left_topic_name
            ),
        ));
    }

    if topics.odom_topic_name == topics.imcoder_left_topic_name
        || topics.odom_topic_name == topics.imcoder_right_topic_name
    {
        return Err(ContractError::config_validation(
            "topics.odom_topic_name",
            format!(
                "odometry topic '{}' collides with an imcoder input topic",
                topics.odom_topic_name
            ),
        ));
    }

    Ok(())
}

/// 校验坐标系
fn validate_frames(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let frames = &blueprint.frames;
    if frames.odom_frame_id == frames.odom_child_frame_id {
        return Err(ContractError::config_validation(
            "frames.odom_child_frame_id",
            format!(
                "child frame must differ from odom frame '{}'",
                frames.odom_frame_id
            ),
        ));
    }
    Ok(())
}

/// 校验同步配置
fn validate_sync_config(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.sync;

    if let Some(max_wait) = sync.max_wait_sec {
        if max_wait < sync.tolerance_sec {
            return Err(ContractError::config_validation(
                "sync.max_wait_sec",
                format!(
                    "max_wait_sec ({max_wait}) must be >= tolerance_sec ({})",
                    sync.tolerance_sec
                ),
            ));
        }
    }

    // Implies max_age_sec >= tolerance_sec
    let max_wait = blueprint.to_matcher_config().max_wait_sec;
    if sync.max_age_sec < max_wait {
        return Err(ContractError::config_validation(
            "sync.max_age_sec",
            format!(
                "max_age_sec ({}) must be >= effective max_wait_sec ({max_wait})",
                sync.max_age_sec
            ),
        ));
    }

    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &OdomBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.sink_type == SinkType::Network && !sink.params.contains_key("addr") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.addr", idx),
                "network sink requires 'addr'",
            ));
        }
    }
    Ok(())
}
