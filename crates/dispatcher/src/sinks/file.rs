//! FileSink - appends odometry records and transforms to JSONL files
//!
//! Layout under `base_path`:
//! - `<odom topic>.jsonl`: one odometry record per line (`/` in the topic
//!   becomes `_`, e.g. `imcoders_odom.jsonl`; a topic named `tf` becomes
//!   `tf_odom.jsonl`)
//! - `tf.jsonl`: one transform per line, only for frames that carry one

use contracts::{
    ContractError, OdometryFrame, OdometryRecord, OdometrySink, PoseTransform, UpdateStatus,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Name of the transform file
pub const TF_FILE_NAME: &str = "tf.jsonl";

const TF_STEM: &str = "tf";

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// One line of the odometry file
#[derive(Serialize)]
struct RecordLine<'a> {
    #[serde(flatten)]
    record: &'a OdometryRecord,
    status: UpdateStatus,
}

/// File name for an odometry topic
pub fn topic_file_name(topic: &str) -> String {
    let stem: String = topic
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "odom.jsonl".to_string()
    } else if stem.eq_ignore_ascii_case(TF_STEM) {
        // Never share the transform file
        format!("{stem}_odom.jsonl")
    } else {
        format!("{stem}.jsonl")
    }
}

/// Sink that writes frames to disk files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    /// Open writers keyed by file name
    writers: HashMap<String, BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            writers: HashMap::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    fn writer(&mut self, file_name: &str) -> std::io::Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(file_name) {
            let path = self.config.base_path.join(file_name);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(sink = %self.name, path = %path.display(), "opened output file");
            self.writers
                .insert(file_name.to_string(), BufWriter::new(file));
        }
        self.writers
            .get_mut(file_name)
            .ok_or_else(|| std::io::Error::other("writer missing after insert"))
    }

    fn append_line<T: Serialize>(&mut self, file_name: &str, value: &T) -> std::io::Result<()> {
        let writer = self.writer(file_name)?;
        serde_json::to_writer(&mut *writer, value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }

    fn write_frame_to_disk(&mut self, frame: &OdometryFrame) -> std::io::Result<()> {
        let line = RecordLine {
            record: &frame.odom,
            status: frame.meta.status,
        };
        self.append_line(&topic_file_name(&frame.topic), &line)?;

        if let Some(transform) = &frame.transform {
            self.append_line::<PoseTransform>(TF_FILE_NAME, transform)?;
        }
        Ok(())
    }

    fn persist_frame(&mut self, frame: &OdometryFrame) -> Result<(), ContractError> {
        self.write_frame_to_disk(frame).map_err(|e| {
            error!(sink = %self.name, seq = frame.seq(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    fn flush_all(&mut self) -> Result<(), ContractError> {
        for writer in self.writers.values_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }
}

impl OdometrySink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, seq = frame.seq())
    )]
    async fn write(&mut self, frame: &OdometryFrame) -> Result<(), ContractError> {
        self.persist_frame(frame)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush_all()?;
        self.writers.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EstimatorConfig, EstimatorMeta, PoseEstimate, Twist};
    use odometry::OdometryPublisher;
    use tempfile::tempdir;

    fn publish(config: &EstimatorConfig, n: usize) -> Vec<OdometryFrame> {
        let mut publisher = OdometryPublisher::new(config);
        (0..n)
            .map(|i| {
                publisher.publish(
                    i as f64,
                    PoseEstimate::new(i as f64 * 0.5, 0.0, 0.0),
                    Twist::default(),
                    EstimatorMeta::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_topic_file_name() {
        assert_eq!(topic_file_name("imcoders/odom"), "imcoders_odom.jsonl");
        assert_eq!(topic_file_name("/odom"), "odom.jsonl");
        assert_eq!(topic_file_name("/"), "odom.jsonl");
        assert_eq!(topic_file_name("/tf"), "tf_odom.jsonl");
        assert_eq!(topic_file_name("TF"), "TF_odom.jsonl");
        assert_eq!(topic_file_name("robot/tf"), "robot_tf.jsonl");
    }

    #[tokio::test]
    async fn test_tf_topic_keeps_records_and_transforms_apart() {
        let dir = tempdir().unwrap();
        let config = EstimatorConfig {
            odom_topic_name: "/tf".to_string(),
            ..EstimatorConfig::default()
        };

        let mut sink = FileSink::new(
            "file",
            FileSinkConfig {
                base_path: dir.path().to_path_buf(),
            },
        )
        .unwrap();
        for frame in publish(&config, 4) {
            sink.write(&frame).await.unwrap();
        }
        sink.close().await.unwrap();

        let odom = fs::read_to_string(dir.path().join("tf_odom.jsonl")).unwrap();
        let tf = fs::read_to_string(dir.path().join(TF_FILE_NAME)).unwrap();
        assert_eq!(odom.lines().count(), 4);
        assert_eq!(tf.lines().count(), 4);
        for line in tf.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("translation").is_some());
            assert!(value.get("pose").is_none());
        }
    }

    #[tokio::test]
    async fn test_file_sink_write() {
        let dir = tempdir().unwrap();
        let config = FileSinkConfig {
            base_path: dir.path().to_path_buf(),
        };

        let mut sink = FileSink::new("test_file", config).unwrap();
        for frame in publish(&EstimatorConfig::default(), 3) {
            sink.write(&frame).await.unwrap();
        }
        sink.close().await.unwrap();

        let odom = fs::read_to_string(dir.path().join("imcoders_odom.jsonl")).unwrap();
        let lines: Vec<_> = odom.lines().collect();
        assert_eq!(lines.len(), 3);

        let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["seq"], 2);
        assert_eq!(last["frame_id"], "odom");
        assert_eq!(last["pose"]["x"], 1.0);
        assert_eq!(last["status"], "seeded");

        let tf = fs::read_to_string(dir.path().join(TF_FILE_NAME)).unwrap();
        assert_eq!(tf.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_no_tf_file_without_transforms() {
        let dir = tempdir().unwrap();
        let mut params = HashMap::new();
        params.insert(
            "base_path".to_string(),
            dir.path().join("nested").display().to_string(),
        );
        let mut sink = FileSink::from_params("file", &params).unwrap();

        let config = EstimatorConfig {
            publish_tf: false,
            ..EstimatorConfig::default()
        };
        for frame in publish(&config, 2) {
            sink.write(&frame).await.unwrap();
        }
        sink.flush().await.unwrap();

        assert!(sink.base_path().join("imcoders_odom.jsonl").exists());
        assert!(!sink.base_path().join(TF_FILE_NAME).exists());
    }
}
