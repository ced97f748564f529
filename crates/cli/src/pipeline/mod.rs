//! Pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{MockMotion, Pipeline, PipelineConfig, SourceSpec};
pub use stats::{PipelineStats, StopReason};
