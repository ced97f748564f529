//! 数据源适配器
//!
//! 将 `ReadingSource` 回调桥接到 ingestion 通道，并执行背压策略。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{DropPolicy, ImcoderReading, ReadingCallback, ReadingSource, WheelSide};
use tracing::{debug, trace, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};

/// 通道两端，DropOldest 需要一个接收端来挤出最旧的读数
#[derive(Clone)]
pub(crate) struct ChannelEnds {
    pub tx: Sender<ImcoderReading>,
    pub rx: Receiver<ImcoderReading>,
}

/// 按背压策略发送读数
///
/// 返回 `false` 表示通道已关闭。
pub(crate) fn send_reading(
    ends: &ChannelEnds,
    reading: ImcoderReading,
    metrics: &IngestionMetrics,
    source_name: &str,
    config: &BackpressureConfig,
) -> bool {
    if config.block_when_full {
        return match ends.tx.send_blocking(reading) {
            Ok(()) => {
                metrics.update_queue_len(ends.tx.len());
                true
            }
            Err(_) => {
                debug!(source = %source_name, "channel closed");
                false
            }
        };
    }

    match ends.tx.try_send(reading) {
        Ok(()) => {
            trace!(source = %source_name, "reading sent");
            metrics.update_queue_len(ends.tx.len());
            true
        }
        Err(TrySendError::Full(reading)) => {
            metrics.record_dropped();
            metrics::counter!("imcoders_ingestion_dropped_total", "source" => source_name.to_string())
                .increment(1);
            match config.drop_policy {
                DropPolicy::DropNewest => {
                    trace!(source = %source_name, "reading dropped (newest)");
                }
                DropPolicy::DropOldest => {
                    // 挤出队首后重试一次，仍然满则放弃新读数
                    let _ = ends.rx.try_recv();
                    if ends.tx.try_send(reading).is_err() {
                        metrics.record_dropped();
                    }
                    trace!(source = %source_name, "reading dropped (oldest)");
                }
            }
            true
        }
        Err(TrySendError::Closed(_)) => {
            warn!(source = %source_name, "channel closed");
            false
        }
    }
}

/// 数据源适配器
///
/// 每个注册的 `ReadingSource` 对应一个适配器，负责启停和背压。
pub struct SourceAdapter {
    source: Box<dyn ReadingSource>,
    config: BackpressureConfig,
    listening: Arc<AtomicBool>,
}

impl SourceAdapter {
    pub fn new(source: Box<dyn ReadingSource>, config: BackpressureConfig) -> Self {
        Self {
            source,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn side(&self) -> WheelSide {
        self.source.side()
    }

    pub fn config(&self) -> &BackpressureConfig {
        &self.config
    }

    pub(crate) fn start(&self, ends: ChannelEnds, metrics: Arc<IngestionMetrics>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = self.source.name().to_string();
        let expected_side = self.source.side();
        let config = self.config.clone();
        let listening = self.listening.clone();

        debug!(source = %name, side = %expected_side, "starting source adapter");

        let callback: ReadingCallback = Arc::new(move |reading| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            if reading.side != expected_side {
                warn!(
                    source = %name,
                    expected = %expected_side,
                    got = %reading.side,
                    "reading from wrong side discarded"
                );
                return;
            }

            metrics.record_received(reading.side);
            if !send_reading(&ends, reading, &metrics, &name, &config) {
                listening.store(false, Ordering::SeqCst);
            }
        });

        self.source.listen(callback);
    }

    pub(crate) fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source = %self.source.name(), "stopping source adapter");
        }
        self.source.stop();
    }

    /// Adapter accepting readings and source still producing
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed) && self.source.is_listening()
    }
}
