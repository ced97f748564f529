//! ReadingSource trait - Imcoder data source abstraction
//!
//! Decouples the ingestion pipeline from where readings come from (a live
//! sensor bridge, a simulated wheel or a recording).

use std::sync::Arc;

use crate::{ImcoderReading, WheelSide};

/// Reading callback type
///
/// When a source produces a reading, it sends it through this callback.
/// Uses `Arc` to allow callback sharing across multiple contexts.
pub type ReadingCallback = Arc<dyn Fn(ImcoderReading) + Send + Sync>;

/// Imcoder reading source trait
///
/// Simulated and replayed sources implement the same API so the pipeline
/// treats them alike.
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn ReadingSource> = get_source();
/// source.listen(Arc::new(|reading| {
///     println!("{} @ {}", reading.side, reading.timestamp);
/// }));
/// // ... use source ...
/// source.stop();
/// ```
pub trait ReadingSource: Send + Sync {
    /// Source name (usually the input topic)
    fn name(&self) -> &str;

    /// Wheel this source reports for
    fn side(&self) -> WheelSide;

    /// Register data callback
    ///
    /// Repeated calls while already listening are ignored.
    fn listen(&self, callback: ReadingCallback);

    /// Stop producing readings
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
