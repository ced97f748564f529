//! Pipeline statistics and metrics.

use std::fmt;
use std::time::Duration;

use contracts::MatcherStats;
use observability::OdometryMetricsAggregator;

/// Why the pipeline stopped consuming readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Every source ran out of readings
    #[default]
    SourcesExhausted,
    /// `--max-frames` reached
    MaxFrames,
    /// `--timeout` elapsed
    Timeout,
    /// Ctrl+C / SIGTERM
    Signal,
    /// Dispatcher stopped accepting frames
    DispatcherClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::SourcesExhausted => "sources exhausted",
            StopReason::MaxFrames => "max frames reached",
            StopReason::Timeout => "timeout",
            StopReason::Signal => "shutdown signal",
            StopReason::DispatcherClosed => "dispatcher closed",
        };
        f.write_str(text)
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Source description
    pub source: String,

    /// Why the run ended
    pub stop_reason: StopReason,

    /// Readings taken from the sources
    pub readings_received: u64,

    /// Odometry frames produced by the estimator
    pub frames_published: u64,

    /// Frames the dispatcher received
    pub frames_dispatched: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of reading sources
    pub active_sources: usize,

    /// Number of sinks that received data
    pub active_sinks: usize,

    /// Matcher counters at shutdown
    pub matcher: MatcherStats,

    /// Ingestion channel counters (streamed sources only)
    pub ingestion: Option<ingestion::MetricsSnapshot>,

    /// Per-sink delivery counters
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Odometry aggregator
    pub odometry: OdometryMetricsAggregator,
}

impl PipelineStats {
    /// Calculate frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fraction of readings that ended up in a pair (two readings per pair)
    pub fn pairing_rate(&self) -> f64 {
        if self.readings_received > 0 {
            (self.matcher.matched * 2) as f64 / self.readings_received as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Source: {}", self.source);
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Readings received: {}", self.readings_received);
        println!("   ├─ Frames published: {}", self.frames_published);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   ├─ Active sources: {}", self.active_sources);
        println!("   └─ Active sinks: {}", self.active_sinks);

        let m = &self.matcher;
        println!("\n🔗 Pair Matcher");
        println!("   ├─ Pairs matched: {} ({:.2}% of readings)", m.matched, self.pairing_rate());
        println!("   ├─ Dropped unmatched: {}", m.dropped_unmatched);
        println!("   ├─ Dropped stale: {}", m.dropped_stale);
        println!("   ├─ Dropped late: {}", m.dropped_late);
        println!("   ├─ Dropped overflow: {}", m.dropped_overflow);
        println!("   ├─ Dropped expired: {}", m.dropped_expired);
        println!("   └─ Duplicates: {}", m.duplicates);

        if let Some(ref ingestion) = self.ingestion {
            println!("\n📥 Ingestion");
            println!("   ├─ Left readings: {}", ingestion.left_received);
            println!("   ├─ Right readings: {}", ingestion.right_received);
            println!("   └─ Dropped (backpressure): {}", ingestion.readings_dropped);
        }

        println!("\n🧭 {}", self.odometry.summary());

        if !self.sinks.is_empty() {
            println!("📤 Sinks ({} frames dispatched)", self.frames_dispatched);
            for (i, (name, snapshot)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, name, snapshot);
            }
        }

        println!();
    }
}
