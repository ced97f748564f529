//! ImcoderPair - Pair matcher output
//!
//! Left/right readings matched within the sync tolerance.

use serde::{Deserialize, Serialize};

use crate::{ImcoderReading, WheelSide};

/// Matched left/right reading pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImcoderPair {
    /// Pair sequence number (monotonically increasing)
    pub pair_id: u64,

    /// Pair stamp: the later of the two reading stamps
    pub stamp: f64,

    pub left: ImcoderReading,

    pub right: ImcoderReading,
}

impl ImcoderPair {
    /// Build a pair from two readings of opposite sides, in any order
    pub fn from_readings(pair_id: u64, a: ImcoderReading, b: ImcoderReading) -> Self {
        let (left, right) = if a.side == WheelSide::Left {
            (a, b)
        } else {
            (b, a)
        };
        Self {
            pair_id,
            stamp: left.timestamp.max(right.timestamp),
            left,
            right,
        }
    }

    /// Absolute stamp difference between the two readings
    pub fn skew(&self) -> f64 {
        (self.left.timestamp - self.right.timestamp).abs()
    }

    pub fn reading(&self, side: WheelSide) -> &ImcoderReading {
        match side {
            WheelSide::Left => &self.left,
            WheelSide::Right => &self.right,
        }
    }
}

/// Pair matcher counters (for diagnostics)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherStats {
    /// Buffered left readings
    pub left_depth: usize,

    /// Buffered right readings
    pub right_depth: usize,

    /// Pairs emitted
    pub matched: u64,

    /// Readings dropped because no partner existed within tolerance
    pub dropped_unmatched: u64,

    /// Readings superseded by a closer reading of the same side
    pub dropped_stale: u64,

    /// Readings arriving at or before the last consumed stamp of their side
    pub dropped_late: u64,

    /// Readings evicted by a full queue
    pub dropped_overflow: u64,

    /// Readings aged out of the buffering window (`max_age_sec`)
    pub dropped_expired: u64,

    /// Readings whose stamp was already buffered
    pub duplicates: u64,
}

impl MatcherStats {
    /// Total readings discarded without producing a pair
    pub fn total_dropped(&self) -> u64 {
        self.dropped_unmatched
            + self.dropped_stale
            + self.dropped_late
            + self.dropped_overflow
            + self.dropped_expired
            + self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quaternion;

    #[test]
    fn pair_orders_sides_and_takes_later_stamp() {
        let right = ImcoderReading::new(WheelSide::Right, 1.02, Quaternion::IDENTITY);
        let left = ImcoderReading::new(WheelSide::Left, 1.00, Quaternion::IDENTITY);
        let pair = ImcoderPair::from_readings(7, right, left);

        assert_eq!(pair.left.side, WheelSide::Left);
        assert_eq!(pair.right.side, WheelSide::Right);
        assert_eq!(pair.stamp, 1.02);
        assert!((pair.skew() - 0.02).abs() < 1e-12);
    }
}
