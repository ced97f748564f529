//! # Sync Engine
//!
//! Approximate-time matching of left/right imcoder readings.
//!
//! Responsibilities:
//! - per-wheel sorted reading queues with a bounded buffering window
//! - deterministic closest-stamp pairing within a fixed tolerance
//! - output `ImcoderPair`
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{MatcherConfig, PairMatcher};
//!
//! let mut matcher = PairMatcher::new(MatcherConfig::default());
//!
//! // Push readings as they arrive
//! for pair in matcher.push(reading) {
//!     // Handle matched pair
//! }
//! ```

mod buffer;
mod matcher;

pub use buffer::{InsertOutcome, ReadingBuffer};
pub use matcher::PairMatcher;

// Re-export contracts types
pub use contracts::{ImcoderPair, ImcoderReading, MatcherConfig, MatcherStats, WheelSide};
