//! OdometrySink trait - Dispatcher output interface

use crate::{ContractError, OdometryFrame};

/// Odometry output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(OdometrySink: Send)]
pub trait LocalOdometrySink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one odometry frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, frame: &OdometryFrame) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
