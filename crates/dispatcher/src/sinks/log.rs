//! LogSink - logs odometry summary via tracing

use contracts::{ContractError, OdometryFrame, OdometrySink};
use tracing::{info, instrument};

/// Sink that logs odometry summaries for debugging
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_frame_summary(&self, frame: &OdometryFrame) {
        let odom = &frame.odom;
        info!(
            sink = %self.name,
            topic = %frame.topic,
            seq = odom.seq,
            timestamp = odom.timestamp,
            x = odom.pose.x,
            y = odom.pose.y,
            theta = odom.pose.theta,
            linear = odom.twist.linear,
            angular = odom.twist.angular,
            status = frame.meta.status.as_str(),
            tf = frame.transform.is_some(),
            "odometry"
        );
    }
}

impl OdometrySink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, seq = frame.seq())
    )]
    async fn write(&mut self, frame: &OdometryFrame) -> Result<(), ContractError> {
        self.log_frame_summary(frame);
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, frames = self.written, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EstimatorConfig, EstimatorMeta, PoseEstimate, Twist};
    use odometry::OdometryPublisher;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let frame = OdometryPublisher::new(&EstimatorConfig::default()).publish(
            1.0,
            PoseEstimate::new(0.5, 0.0, 0.1),
            Twist::default(),
            EstimatorMeta::default(),
        );

        assert!(sink.write(&frame).await.is_ok());
        assert_eq!(sink.written, 1);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
