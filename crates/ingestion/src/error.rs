//! Ingestion 错误类型

use std::path::PathBuf;

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 录制文件读取失败
    #[error("failed to read recording {path}: {source}")]
    RecordingIo {
        /// 文件路径
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 录制文件某一行解析失败
    #[error("invalid reading at {path}:{line}: {message}")]
    RecordingParse {
        /// 文件路径
        path: PathBuf,
        /// 行号 (1-based)
        line: usize,
        /// 错误消息
        message: String,
    },

    /// 录制文件不包含该侧的读数
    #[error("recording {path} holds no {side} readings")]
    EmptyRecording {
        /// 文件路径
        path: PathBuf,
        /// 轮子
        side: String,
    },

    /// 数据源参数非法
    #[error("invalid source '{source_name}': {message}")]
    InvalidSource {
        /// 数据源名称
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 通道已关闭
    #[error("channel closed for source {source_name}")]
    ChannelClosed {
        /// 数据源名称
        source_name: String,
    },
}

impl IngestionError {
    pub fn invalid_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
