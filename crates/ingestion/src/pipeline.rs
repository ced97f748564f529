//! Ingestion Pipeline main entry

use std::sync::Arc;

use async_channel::{bounded, Receiver};
use contracts::{ImcoderReading, ReadingSource, WheelSide};
use tracing::{debug, info, instrument};

use crate::adapter::{ChannelEnds, SourceAdapter};
use crate::config::{BackpressureConfig, IngestionMetrics};

/// Ingestion Pipeline
///
/// Manages the imcoder sources and merges their readings into one stream.
pub struct IngestionPipeline {
    /// Registered adapters, in registration order
    adapters: Vec<SourceAdapter>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Channel shared by all adapters
    ends: ChannelEnds,

    /// Data receiver
    rx: Option<Receiver<ImcoderReading>>,

    /// Default backpressure configuration
    default_config: BackpressureConfig,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    ///
    /// # Arguments
    /// * `channel_capacity` - Channel capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(BackpressureConfig {
            channel_capacity,
            ..Default::default()
        })
    }

    /// Create with custom backpressure configuration
    pub fn with_config(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));

        Self {
            adapters: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            ends: ChannelEnds { tx, rx: rx.clone() },
            rx: Some(rx),
            default_config: config,
        }
    }

    /// Register an imcoder source
    ///
    /// # Arguments
    /// * `source` - Data source implementing `ReadingSource`
    /// * `config` - Optional backpressure configuration
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source, config),
        fields(source = %source.name(), side = %source.side())
    )]
    pub fn register_source(
        &mut self,
        source: Box<dyn ReadingSource>,
        config: Option<BackpressureConfig>,
    ) {
        let adapter = SourceAdapter::new(
            source,
            config.unwrap_or_else(|| self.default_config.clone()),
        );
        debug!(source = %adapter.name(), "registered imcoder source");
        self.adapters.push(adapter);
    }

    /// Start all registered sources
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.adapters.len(), "starting all imcoder sources");
        for adapter in &self.adapters {
            adapter.start(self.ends.clone(), self.metrics.clone());
        }
    }

    /// Stop all sources
    ///
    /// Blocking sources are woken by closing the channel first.
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all imcoder sources");
        self.ends.tx.close();
        for adapter in &self.adapters {
            adapter.stop();
        }
    }

    /// Get data stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<ImcoderReading>> {
        self.rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Get registered source count
    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// Sides covered by the registered sources
    pub fn has_side(&self, side: WheelSide) -> bool {
        self.adapters.iter().any(|a| a.side() == side)
    }

    /// Check if any source is still producing readings
    pub fn any_listening(&self) -> bool {
        self.adapters.iter().any(|a| a.is_listening())
    }

    /// Check if the named source is listening
    pub fn is_source_listening(&self, name: &str) -> bool {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.is_listening())
            .unwrap_or(false)
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
