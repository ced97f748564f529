//! # Dispatcher
//!
//! 里程计输出分发模块。
//!
//! 负责：
//! - 消费 `OdometryFrame`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞估计主链路
//! - 按 `UpdateStatus` 统计每个 sink 的写入

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{OdometryFrame, OdometrySink};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::{Delivery, SinkHandle, DEFAULT_FLUSH_INTERVAL};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkSink};
