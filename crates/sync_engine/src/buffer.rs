//! Per-wheel reading queue with timestamp-based ordering.
//!
//! Readings are kept sorted by stamp inside a bounded `HeapRb`. The common
//! case (a reading newer than everything buffered) is a plain push; an
//! out-of-order reading rebuilds the ring around the insertion point.

use std::fmt;

use contracts::ImcoderReading;
use ringbuf::{traits::*, HeapRb};

/// Result of inserting a reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InsertOutcome {
    /// Buffered
    Inserted,
    /// Buffered after evicting the oldest reading of a full queue
    Evicted(f64),
    /// Stamp already buffered, reading discarded
    Duplicate,
    /// Stamp at or before the last consumed stamp (or not finite), discarded
    Late,
}

/// Sorted, bounded reading queue for one wheel
pub struct ReadingBuffer {
    ring: HeapRb<ImcoderReading>,
    capacity: usize,
    /// Newest stamp that left the queue (consumed, dropped or evicted)
    last_consumed: Option<f64>,
}

impl fmt::Debug for ReadingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("last_consumed", &self.last_consumed)
            .finish()
    }
}

impl ReadingBuffer {
    /// Create a new reading buffer
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            last_consumed: None,
        }
    }

    /// Insert a reading, keeping the queue sorted by stamp
    pub fn insert(&mut self, reading: ImcoderReading) -> InsertOutcome {
        let timestamp = reading.timestamp;
        if !timestamp.is_finite() || self.last_consumed.is_some_and(|last| timestamp <= last) {
            return InsertOutcome::Late;
        }
        if self.ring.iter().any(|r| r.timestamp == timestamp) {
            return InsertOutcome::Duplicate;
        }

        let evicted = if self.ring.is_full() {
            // A full queue never trades a newer reading for an older one
            if self.head().is_some_and(|head| timestamp < head.timestamp) {
                return InsertOutcome::Late;
            }
            self.pop_front().map(|r| r.timestamp)
        } else {
            None
        };

        let in_order = self
            .newest()
            .map_or(true, |newest| newest.timestamp < timestamp);
        if in_order {
            let _ = self.ring.try_push(reading);
        } else {
            let mut readings: Vec<ImcoderReading> = self.ring.pop_iter().collect();
            let at = readings.partition_point(|r| r.timestamp < timestamp);
            readings.insert(at, reading);
            for r in readings {
                let _ = self.ring.try_push(r);
            }
        }

        match evicted {
            Some(ts) => InsertOutcome::Evicted(ts),
            None => InsertOutcome::Inserted,
        }
    }

    /// Earliest buffered reading
    #[inline]
    pub fn head(&self) -> Option<&ImcoderReading> {
        self.ring.iter().next()
    }

    /// Reading right after the head
    #[inline]
    pub fn successor(&self) -> Option<&ImcoderReading> {
        self.ring.iter().nth(1)
    }

    /// Latest buffered reading
    #[inline]
    pub fn newest(&self) -> Option<&ImcoderReading> {
        self.ring.iter().last()
    }

    /// Remove and return the earliest reading
    #[inline]
    pub fn pop_front(&mut self) -> Option<ImcoderReading> {
        let reading = self.ring.try_pop()?;
        self.mark_consumed(reading.timestamp);
        Some(reading)
    }

    /// Evict readings stamped before `cutoff`
    pub fn evict_before(&mut self, cutoff: f64) -> usize {
        let mut evicted = 0;
        while self.head().is_some_and(|r| r.timestamp < cutoff) {
            self.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Number of buffered readings
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drop everything, including the late-reading watermark
    pub fn clear(&mut self) {
        self.ring.pop_iter().for_each(drop);
        self.last_consumed = None;
    }

    fn mark_consumed(&mut self, timestamp: f64) {
        self.last_consumed = Some(self.last_consumed.map_or(timestamp, |t| t.max(timestamp)));
    }
}
