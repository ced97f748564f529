//! Per-sink worker with an isolated bounded queue
//!
//! The estimator side never waits on a sink: [`SinkHandle::offer`] queues the
//! frame or drops it. The worker task writes frames in order, accounts each
//! write under the frame's `UpdateStatus` and flushes its sink on a timer
//! while unflushed writes are pending, so file outputs follow the live stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, instrument, warn};

use contracts::{OdometryFrame, OdometrySink};

use crate::metrics::SinkMetrics;

/// Flush period of a sink with pending writes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of offering a frame to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full, frame dropped
    Dropped,
    /// Worker no longer running
    Closed,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<OdometryFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker for `sink` with a queue of `capacity` frames
    pub fn spawn<S: OdometrySink + Send + 'static>(sink: S, capacity: usize) -> Self {
        Self::spawn_with_flush_interval(sink, capacity, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn spawn_with_flush_interval<S: OdometrySink + Send + 'static>(
        sink: S,
        capacity: usize,
        flush_interval: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            name: name.clone(),
            sink,
            rx,
            metrics: Arc::clone(&metrics),
            unflushed: 0,
        };
        let worker = tokio::spawn(worker.run(flush_interval));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a frame to the worker without waiting
    pub fn offer(&self, frame: OdometryFrame) -> Delivery {
        let seq = frame.seq();
        let status = frame.meta.status;

        match self.tx.try_send(frame) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_drop();
                observability::record_frame_dispatched(&self.name, false);
                warn!(sink = %self.name, seq, status = status.as_str(), "Sink queue full, frame dropped");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, seq, "Sink worker is gone");
                Delivery::Closed
            }
        }
    }

    /// Close the queue, then wait until the worker has drained it and closed the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        let Self {
            name, tx, worker, ..
        } = self;
        drop(tx);

        if let Err(e) = worker.await {
            error!(sink = %name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %name, "Sink worker joined");
    }
}

struct SinkWorker<S> {
    name: String,
    sink: S,
    rx: mpsc::Receiver<OdometryFrame>,
    metrics: Arc<SinkMetrics>,
    /// Writes since the last successful flush
    unflushed: u64,
}

impl<S: OdometrySink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip_all, fields(sink = %self.name))]
    async fn run(mut self, flush_interval: Duration) {
        debug!("Sink worker started");

        let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = self.rx.recv() => match frame {
                    Some(frame) => self.write(&frame).await,
                    None => break,
                },
                _ = ticker.tick(), if self.unflushed > 0 => self.flush().await,
            }
        }

        self.finish().await;
    }

    async fn write(&mut self, frame: &OdometryFrame) {
        self.metrics.set_queue_len(self.rx.len());

        match self.sink.write(frame).await {
            Ok(()) => {
                self.metrics.record_write(frame);
                self.unflushed += 1;
                observability::record_frame_dispatched(&self.name, true);
            }
            Err(e) => {
                // A failed frame is lost for this sink only
                self.metrics.record_failure();
                observability::record_frame_dispatched(&self.name, false);
                error!(
                    sink = %self.name,
                    seq = frame.seq(),
                    status = frame.meta.status.as_str(),
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    async fn flush(&mut self) {
        match self.sink.flush().await {
            Ok(()) => {
                debug!(sink = %self.name, frames = self.unflushed, "Flushed");
                self.metrics.record_flush();
                self.unflushed = 0;
            }
            Err(e) => warn!(sink = %self.name, error = %e, "Flush failed, retrying on next tick"),
        }
    }

    async fn finish(mut self) {
        if self.unflushed > 0 {
            self.flush().await;
        }
        if let Err(e) = self.sink.close().await {
            error!(sink = %self.name, error = %e, "Close failed on shutdown");
        }
        self.metrics.set_queue_len(0);

        debug!(
            sink = %self.name,
            written = self.metrics.write_count(),
            failed = self.metrics.failure_count(),
            "Sink worker stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, EstimatorConfig, EstimatorMeta, PoseEstimate, Twist, UpdateStatus};
    use odometry::OdometryPublisher;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// What a recording sink saw
    #[derive(Default)]
    struct Log {
        written: Vec<(u64, UpdateStatus)>,
        flushes: usize,
        closed: bool,
    }

    /// Sink that records frames, optionally slowly or failing some seqs
    struct RecordingSink {
        log: Arc<Mutex<Log>>,
        delay: Duration,
        fail_seq: Option<u64>,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<Log>>) {
            let log = Arc::new(Mutex::new(Log::default()));
            let sink = Self {
                log: Arc::clone(&log),
                delay: Duration::ZERO,
                fail_seq: None,
            };
            (sink, log)
        }
    }

    impl OdometrySink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&mut self, frame: &OdometryFrame) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail_seq == Some(frame.seq()) {
                return Err(ContractError::sink_write("recording", "rejected"));
            }
            self.log
                .lock()
                .unwrap()
                .written
                .push((frame.seq(), frame.meta.status));
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.log.lock().unwrap().flushes += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.log.lock().unwrap().closed = true;
            Ok(())
        }
    }

    /// One frame per status, cycling, seq = index
    fn frames(n: usize) -> Vec<OdometryFrame> {
        let mut publisher = OdometryPublisher::new(&EstimatorConfig::default());
        (0..n)
            .map(|i| {
                publisher.publish(
                    i as f64 * 0.02,
                    PoseEstimate::new(i as f64 * 0.01, 0.0, 0.0),
                    Twist::default(),
                    EstimatorMeta {
                        status: UpdateStatus::ALL[i % UpdateStatus::ALL.len()],
                        ..EstimatorMeta::default()
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_frames_written_in_order_and_counted_by_status() {
        let (sink, log) = RecordingSink::new();
        let handle = SinkHandle::spawn(sink, 16);

        for frame in frames(10) {
            assert_eq!(handle.offer(frame), Delivery::Queued);
        }
        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        let log = log.lock().unwrap();
        let seqs: Vec<u64> = log.written.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(seqs, (0..10).collect::<Vec<_>>());
        assert!(log.closed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_count, 10);
        for status in UpdateStatus::ALL {
            assert_eq!(snapshot.written_with(status), 2, "{status:?}");
        }
        assert_eq!(snapshot.pose_updates(), 4);
        assert_eq!(snapshot.last_seq, Some(9));
        assert_eq!(snapshot.queue_len, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (mut sink, log) = RecordingSink::new();
        sink.delay = Duration::from_millis(50);
        let handle = SinkHandle::spawn(sink, 2);

        let outcomes: Vec<Delivery> = frames(10).into_iter().map(|f| handle.offer(f)).collect();
        let dropped = outcomes.iter().filter(|d| **d == Delivery::Dropped).count();
        assert!(dropped > 0);
        assert_eq!(handle.metrics().dropped_count(), dropped as u64);

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        let written = log.lock().unwrap().written.len() as u64;
        assert_eq!(metrics.write_count(), written);
        assert_eq!(metrics.snapshot().offered(), 10);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_worker() {
        let (mut sink, log) = RecordingSink::new();
        sink.fail_seq = Some(1);
        let handle = SinkHandle::spawn(sink, 8);

        for frame in frames(3) {
            handle.offer(frame);
        }
        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;

        assert_eq!(metrics.failure_count(), 1);
        assert_eq!(metrics.write_count(), 2);
        let seqs: Vec<u64> = log.lock().unwrap().written.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_pending_writes_flushed_while_idle() {
        let (sink, log) = RecordingSink::new();
        let handle = SinkHandle::spawn_with_flush_interval(sink, 8, Duration::from_millis(10));

        for frame in frames(3) {
            handle.offer(frame);
        }
        sleep(Duration::from_millis(100)).await;

        // Flushed before shutdown, and only once since nothing new arrived
        assert_eq!(log.lock().unwrap().flushes, 1);
        assert_eq!(handle.metrics().flush_count(), 1);

        handle.shutdown().await;
        let log = log.lock().unwrap();
        assert_eq!(log.flushes, 1);
        assert!(log.closed);
    }
}
