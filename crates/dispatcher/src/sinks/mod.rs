//! Sink implementations and the config-driven factory
//!
//! | `sink_type` | params                                         |
//! |-------------|------------------------------------------------|
//! | `log`       | none                                           |
//! | `file`      | `base_path` (default `./output`)               |
//! | `network`   | `addr` (required), `format`, `max_packet_size` |

mod file;
mod log;
mod network;

use contracts::{SinkConfig, SinkType};
use tracing::{info, instrument};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;

pub use self::file::{topic_file_name, FileSink, FileSinkConfig, TF_FILE_NAME};
pub use self::log::LogSink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};

/// Open the sink described by `config` and start its worker
#[instrument(
    name = "sink_open",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn open(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let capacity = config.queue_capacity;
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::spawn(LogSink::new(&config.name), capacity),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::open(&config.name, SinkType::File, e))?;
            info!(path = %sink.base_path().display(), "File sink ready");
            SinkHandle::spawn(sink, capacity)
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params).await?;
            SinkHandle::spawn(sink, capacity)
        }
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(sink_type: SinkType, params: &[(&str, &str)]) -> SinkConfig {
        SinkConfig {
            name: "out".to_string(),
            sink_type,
            queue_capacity: 4,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_network_sink_requires_addr() {
        let err = open(&config(SinkType::Network, &[])).await.err().unwrap();
        assert!(matches!(err, DispatcherError::MissingParam { param: "addr", .. }));
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_network_sink_rejects_unknown_format() {
        let err = open(&config(
            SinkType::Network,
            &[("addr", "127.0.0.1:9870"), ("format", "xml")],
        ))
        .await
        .err()
        .unwrap();
        assert!(matches!(err, DispatcherError::InvalidParam { param: "format", .. }));
    }

    #[tokio::test]
    async fn test_file_sink_opens_under_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("odom_out");
        let handle = open(&config(
            SinkType::File,
            &[("base_path", base.to_str().unwrap())],
        ))
        .await
        .unwrap();

        assert_eq!(handle.name(), "out");
        assert!(base.is_dir());
        handle.shutdown().await;
    }
}
