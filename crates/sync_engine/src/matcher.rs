//! Two-queue approximate-time pair matcher.

use contracts::{ImcoderPair, ImcoderReading, MatcherConfig, MatcherStats, WheelSide};
use tracing::instrument;

use crate::buffer::{InsertOutcome, ReadingBuffer};

/// What to do with the current pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// Pivot has no partner within tolerance
    DropUnmatched(WheelSide),
    /// Pivot's successor is a closer partner
    DropStale(WheelSide),
    /// Wait for more readings
    Wait,
    /// Emit pivot + partner
    Emit,
}

/// Why a reading left its queue without being paired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    Unmatched,
    Stale,
    Late,
    Duplicate,
    /// Evicted by a full queue
    Overflow,
    /// Older than `max_age_sec` behind the newest buffered reading
    Expired,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Unmatched => "unmatched",
            DropReason::Stale => "stale",
            DropReason::Late => "late",
            DropReason::Duplicate => "duplicate",
            DropReason::Overflow => "overflow",
            DropReason::Expired => "expired",
        }
    }
}

/// Left/right imcoder pair matcher
///
/// Readings go into one sorted queue per wheel. Each step looks at the
/// earliest reading across both queues (the pivot, left on ties) and the
/// head of the opposite queue (its closest possible partner, since every
/// later reading of that side is later still):
///
/// 1. partner further than the tolerance: drop the pivot
/// 2. the pivot's successor is strictly closer to the partner: drop the pivot
/// 3. no successor buffered yet and the stamps differ: wait, unless the
///    partner side already runs more than `max_wait_sec` ahead
/// 4. otherwise emit the pair
///
/// Decisions depend only on queue contents, never on which side was pushed
/// last, so both dispatch orders of the same streams yield the same pairs
/// unless one side lags by more than `max_wait_sec`.
#[derive(Debug)]
pub struct PairMatcher {
    config: MatcherConfig,
    left: ReadingBuffer,
    right: ReadingBuffer,
    next_pair_id: u64,
    stats: MatcherStats,
}

impl PairMatcher {
    /// Create a new matcher with the given configuration
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            left: ReadingBuffer::new(config.queue_size),
            right: ReadingBuffer::new(config.queue_size),
            config,
            next_pair_id: 0,
            stats: MatcherStats::default(),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Push a reading and return every pair that became decidable
    #[instrument(
        level = "trace",
        name = "pair_matcher_push",
        skip(self, reading),
        fields(side = %reading.side, timestamp = reading.timestamp)
    )]
    pub fn push(&mut self, reading: ImcoderReading) -> Vec<ImcoderPair> {
        let side = reading.side;
        match self.buffer_mut(side).insert(reading) {
            InsertOutcome::Inserted => {}
            InsertOutcome::Evicted(evicted) => {
                tracing::debug!(side = %side, evicted, "reading queue full, oldest evicted");
                self.count_drop(DropReason::Overflow, 1);
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(side = %side, timestamp = reading.timestamp, "duplicate reading dropped");
                self.count_drop(DropReason::Duplicate, 1);
                return Vec::new();
            }
            InsertOutcome::Late => {
                tracing::debug!(side = %side, timestamp = reading.timestamp, "late reading dropped");
                self.count_drop(DropReason::Late, 1);
                return Vec::new();
            }
        }

        self.evict_expired();
        self.settle(false)
    }

    /// End of stream: settle pending pivots without waiting for successors
    pub fn flush(&mut self) -> Vec<ImcoderPair> {
        self.settle(true)
    }

    /// Back to the freshly constructed state: queues, consumed stamps,
    /// counters and pair ids
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.next_pair_id = 0;
        self.stats = MatcherStats::default();
    }

    /// Current counters and queue depths
    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            left_depth: self.left.len(),
            right_depth: self.right.len(),
            ..self.stats
        }
    }

    fn settle(&mut self, force: bool) -> Vec<ImcoderPair> {
        let mut pairs = Vec::new();
        loop {
            match self.decide(force) {
                Decision::Wait => break,
                Decision::DropUnmatched(side) => {
                    if let Some(r) = self.buffer_mut(side).pop_front() {
                        tracing::trace!(side = %side, timestamp = r.timestamp, "no partner within tolerance");
                    }
                    self.count_drop(DropReason::Unmatched, 1);
                }
                Decision::DropStale(side) => {
                    self.buffer_mut(side).pop_front();
                    self.count_drop(DropReason::Stale, 1);
                }
                Decision::Emit => {
                    let (Some(left), Some(right)) = (self.left.pop_front(), self.right.pop_front())
                    else {
                        break;
                    };
                    pairs.push(self.emit(left, right));
                }
            }
        }
        pairs
    }

    fn decide(&self, force: bool) -> Decision {
        let (Some(left), Some(right)) = (self.left.head(), self.right.head()) else {
            return Decision::Wait;
        };

        let (pivot, partner) = if left.timestamp <= right.timestamp {
            (left, right)
        } else {
            (right, left)
        };
        let gap = partner.timestamp - pivot.timestamp;

        if gap > self.config.tolerance_sec {
            return Decision::DropUnmatched(pivot.side);
        }

        match self.buffer(pivot.side).successor() {
            Some(next) if (partner.timestamp - next.timestamp).abs() < gap => {
                Decision::DropStale(pivot.side)
            }
            Some(_) => Decision::Emit,
            None if gap == 0.0 || force => Decision::Emit,
            None => {
                let lead = self
                    .buffer(partner.side)
                    .newest()
                    .map_or(0.0, |newest| newest.timestamp - pivot.timestamp);
                if lead > self.config.max_wait_sec {
                    Decision::Emit
                } else {
                    Decision::Wait
                }
            }
        }
    }

    fn emit(&mut self, left: ImcoderReading, right: ImcoderReading) -> ImcoderPair {
        let pair = ImcoderPair::from_readings(self.next_pair_id, left, right);
        self.next_pair_id += 1;
        self.stats.matched += 1;

        metrics::counter!("imcoders_pairs_total").increment(1);
        metrics::histogram!("imcoders_pair_skew_seconds").record(pair.skew());
        tracing::trace!(pair_id = pair.pair_id, stamp = pair.stamp, skew = pair.skew(), "pair matched");

        pair
    }

    fn evict_expired(&mut self) {
        let newest = [self.left.newest(), self.right.newest()]
            .into_iter()
            .flatten()
            .map(|r| r.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);
        if !newest.is_finite() {
            return;
        }

        let cutoff = newest - self.config.max_age_sec;
        let evicted = self.left.evict_before(cutoff) + self.right.evict_before(cutoff);
        if evicted > 0 {
            tracing::debug!(evicted, cutoff, "readings aged out of buffering window");
            self.count_drop(DropReason::Expired, evicted as u64);
        }
    }

    fn count_drop(&mut self, reason: DropReason, count: u64) {
        let counter = match reason {
            DropReason::Unmatched => &mut self.stats.dropped_unmatched,
            DropReason::Stale => &mut self.stats.dropped_stale,
            DropReason::Late => &mut self.stats.dropped_late,
            DropReason::Duplicate => &mut self.stats.duplicates,
            DropReason::Overflow => &mut self.stats.dropped_overflow,
            DropReason::Expired => &mut self.stats.dropped_expired,
        };
        *counter += count;
        metrics::counter!("imcoders_readings_dropped_total", "reason" => reason.as_str())
            .increment(count);
    }

    fn buffer(&self, side: WheelSide) -> &ReadingBuffer {
        match side {
            WheelSide::Left => &self.left,
            WheelSide::Right => &self.right,
        }
    }

    fn buffer_mut(&mut self, side: WheelSide) -> &mut ReadingBuffer {
        match side {
            WheelSide::Left => &mut self.left,
            WheelSide::Right => &mut self.right,
        }
    }
}
