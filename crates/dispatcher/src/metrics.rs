//! Per-sink delivery counters

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::{OdometryFrame, UpdateStatus};

const STATUS_COUNT: usize = UpdateStatus::ALL.len();

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Frames written, indexed by `UpdateStatus::index`
    written: [AtomicU64; STATUS_COUNT],
    /// Frames the sink failed to write
    failure_count: AtomicU64,
    /// Frames dropped because the queue was full
    dropped_count: AtomicU64,
    /// Flushes performed by the worker
    flush_count: AtomicU64,
    /// Sequence number of the last frame written, offset by one (0 = none)
    last_seq: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Account a frame the sink accepted
    pub fn record_write(&self, frame: &OdometryFrame) {
        self.written[frame.meta.status.index()].fetch_add(1, Ordering::Relaxed);
        self.last_seq.store(frame.seq() + 1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.written.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn written_with(&self, status: UpdateStatus) -> u64 {
        self.written[status.index()].load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    /// Sequence number of the last frame written
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq.load(Ordering::Relaxed).checked_sub(1)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let written = UpdateStatus::ALL.map(|status| self.written_with(status));
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: written.iter().sum(),
            written,
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            flush_count: self.flush_count(),
            last_seq: self.last_seq(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    /// Written frames per `UpdateStatus`, in `UpdateStatus::ALL` order
    pub written: [u64; STATUS_COUNT],
    pub failure_count: u64,
    pub dropped_count: u64,
    pub flush_count: u64,
    pub last_seq: Option<u64>,
}

impl MetricsSnapshot {
    pub fn written_with(&self, status: UpdateStatus) -> u64 {
        self.written[status.index()]
    }

    /// Written frames that carried a freshly integrated pose
    pub fn pose_updates(&self) -> u64 {
        UpdateStatus::ALL
            .iter()
            .filter(|status| status.advanced_pose())
            .map(|status| self.written_with(*status))
            .sum()
    }

    /// Frames handed to this sink, whatever their fate
    pub fn offered(&self) -> u64 {
        self.write_count + self.failure_count + self.dropped_count
    }

    /// Fraction of offered frames that were written
    pub fn delivery_ratio(&self) -> f64 {
        match self.offered() {
            0 => 1.0,
            offered => self.write_count as f64 / offered as f64,
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "written={} (pose updates {}) failed={} dropped={} ({:.1}% delivered)",
            self.write_count,
            self.pose_updates(),
            self.failure_count,
            self.dropped_count,
            self.delivery_ratio() * 100.0
        )
    }
}
