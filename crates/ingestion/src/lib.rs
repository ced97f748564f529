//! # Ingestion Pipeline
//!
//! Imcoder reading ingestion module.
//!
//! Responsibilities:
//! - Register reading sources (simulated wheel or recorded replay)
//! - Backpressure management and drop policy
//! - Merge both wheels into one stream over async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockImcoderSource};
//! use contracts::WheelSide;
//!
//! let mut pipeline = IngestionPipeline::new(100);
//! pipeline.register_source(
//!     Box::new(MockImcoderSource::wheel("imcoder_left", WheelSide::Left, 2.0, 50.0)?),
//!     None,
//! );
//! pipeline.register_source(
//!     Box::new(MockImcoderSource::wheel("imcoder_right", WheelSide::Right, 2.0, 50.0)?),
//!     None,
//! );
//!
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all();
//! while let Ok(reading) = rx.recv().await {
//!     // Feed the pair matcher
//! }
//! ```

mod adapter;
mod config;
mod error;
mod mock;
mod pipeline;
mod replay;

// Re-exports
pub use adapter::SourceAdapter;
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use contracts::ImcoderReading;
pub use error::{IngestionError, Result};
pub use mock::{MockImcoderConfig, MockImcoderSource};
pub use pipeline::IngestionPipeline;
pub use replay::{Recording, ReplayConfig, ReplaySource};
