//! NetworkSink - UDP fire-and-forget streaming of odometry frames

use contracts::{ContractError, OdometryFrame, OdometrySink, SinkType};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max packet size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from the params map of sink `sink`
    pub fn from_params(
        sink: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let raw_addr = params
            .get("addr")
            .ok_or_else(|| DispatcherError::missing_param(sink, "addr"))?;
        let addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| DispatcherError::invalid_param(sink, "addr", raw_addr, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => {
                return Err(DispatcherError::invalid_param(
                    sink,
                    "format",
                    other,
                    "expected 'json' or 'bincode'",
                ))
            }
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| DispatcherError::invalid_param(sink, "max_packet_size", raw, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends frames over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    /// Create a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let config = NetworkSinkConfig::from_params(name, params)?;
        Self::new(name, config)
            .await
            .map_err(|e| DispatcherError::open(name, SinkType::Network, e))
    }

    fn serialize_frame(&self, frame: &OdometryFrame) -> Result<Vec<u8>, String> {
        // Serialize the full frame
        match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(frame).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(frame).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, frame: &OdometryFrame) -> Result<Vec<u8>, ContractError> {
        let data = self
            .serialize_frame(frame)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, dropped"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "packet of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], seq: u64) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, seq, bytes = sent, "Sent");
            }
            Err(e) => {
                // Log but don't fail - UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl OdometrySink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, frame),
        fields(sink = %self.name, seq = frame.seq())
    )]
    async fn write(&mut self, frame: &OdometryFrame) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(frame)?;
        self.transmit(socket, &data, frame.seq()).await;
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EstimatorConfig, EstimatorMeta, PoseEstimate, Twist};
    use odometry::OdometryPublisher;
    use std::collections::HashMap;

    fn frame() -> OdometryFrame {
        OdometryPublisher::new(&EstimatorConfig::default()).publish(
            1.0,
            PoseEstimate::new(0.25, -0.5, 0.3),
            Twist {
                linear: 0.1,
                angular: 0.02,
            },
            EstimatorMeta::default(),
        )
    }

    #[test]
    fn test_network_sink_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkSinkConfig::from_params("udp", &params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);

        params.insert("addr".to_string(), "not-an-addr".to_string());
        let err = NetworkSinkConfig::from_params("udp", &params).unwrap_err();
        assert!(matches!(err, DispatcherError::InvalidParam { param: "addr", .. }));
    }

    #[tokio::test]
    async fn test_json_datagram_round_trip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 65000,
        };

        let mut sink = NetworkSink::new("test_net", config).await.unwrap();
        let sent = frame();
        sink.write(&sent).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let len = receiver.recv(&mut buf).await.unwrap();
        let received: OdometryFrame = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(received.topic, sent.topic);
        assert_eq!(received.seq(), sent.seq());
        assert!((received.odom.pose.theta - 0.3).abs() < 1e-12);
        assert!((received.odom.pose.y + 0.5).abs() < 1e-12);
        assert!(received.transform.is_some());
    }

    #[tokio::test]
    async fn test_bincode_datagram_round_trip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Bincode,
            max_packet_size: 65000,
        };

        let mut sink = NetworkSink::new("test_net", config).await.unwrap();
        let sent = frame();
        sink.write(&sent).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let len = receiver.recv(&mut buf).await.unwrap();
        let received: OdometryFrame = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_oversized_packet_is_a_write_error() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 16,
        };

        let mut sink = NetworkSink::new("tiny", config).await.unwrap();
        assert!(sink.write(&frame()).await.is_err());
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19997".parse().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 65000,
        };

        let mut sink = NetworkSink::new("closed", config).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(&frame()).await.is_err());
    }
}
