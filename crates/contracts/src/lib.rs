//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the imcoders odometry
//! workspace: wheel readings, matched pairs, odometry output, configuration
//! schema and the source/sink traits. Business crates depend on this crate,
//! never the other way round.
//!
//! ## Time Model
//! - Sensor header stamps (seconds, f64) are the only clock
//! - `seq` is optional, used for ordering/diagnostics

mod blueprint;
mod error;
mod engine_config;
mod odometry;
mod pair;
mod reading;
mod reading_source;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use engine_config::*;
pub use odometry::*;
pub use pair::*;
pub use reading::*;
pub use reading_source::{ReadingCallback, ReadingSource};
pub use sink::*;
