//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::WheelSide;
pub use contracts::DropPolicy;

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,

    /// Block the source thread instead of dropping when full.
    ///
    /// Used for lossless replay; overrides `drop_policy`.
    pub block_when_full: bool,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            drop_policy: DropPolicy::DropNewest,
            block_when_full: false,
        }
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity,
            drop_policy,
            block_when_full: false,
        }
    }

    /// Lossless configuration: sources wait for room in the channel
    pub fn blocking(channel_capacity: usize) -> Self {
        Self {
            channel_capacity,
            drop_policy: DropPolicy::DropNewest,
            block_when_full: true,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Readings received from the left source
    pub left_received: AtomicU64,

    /// Readings received from the right source
    pub right_received: AtomicU64,

    /// Readings dropped on backpressure (either policy)
    pub readings_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record reading received
    pub fn record_received(&self, side: WheelSide) {
        let counter = match side {
            WheelSide::Left => &self.left_received,
            WheelSide::Right => &self.right_received,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record reading dropped
    pub fn record_dropped(&self) {
        self.readings_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            left_received: self.left_received.load(Ordering::Relaxed),
            right_received: self.right_received.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub left_received: u64,
    pub right_received: u64,
    pub readings_dropped: u64,
    pub queue_len: usize,
}

impl MetricsSnapshot {
    pub fn total_received(&self) -> u64 {
        self.left_received + self.right_received
    }
}
