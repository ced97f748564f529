//! Mock imcoder source
//!
//! Simulates a sensor rigidly mounted on a wheel spinning at a constant rate.
//! Readings are stamped on a simulated clock, so two mocks started with the
//! same `start_time` produce streams that pair up exactly (plus any skew).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{ImcoderReading, Quaternion, ReadingCallback, ReadingSource, RotationAxis, WheelSide};
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};

/// Mock imcoder configuration
#[derive(Debug, Clone)]
pub struct MockImcoderConfig {
    /// Wheel side
    pub side: WheelSide,

    /// Publish frequency (Hz)
    pub frequency_hz: f64,

    /// Wheel spin rate (rad/s)
    pub angular_rate: f64,

    /// Spin axis in the sensor frame
    pub rotation_axis: RotationAxis,

    /// Wheel angle at the first reading (rad)
    pub initial_angle: f64,

    /// Stamp of the first reading (s)
    pub start_time: f64,

    /// Fixed offset added to every stamp (s)
    pub skew_sec: f64,

    /// Sleep between readings; `false` emits as fast as the callback allows
    pub paced: bool,

    /// Stop after this many readings
    pub max_readings: Option<u64>,
}

impl Default for MockImcoderConfig {
    fn default() -> Self {
        Self {
            side: WheelSide::Left,
            frequency_hz: 50.0,
            angular_rate: 2.0,
            rotation_axis: RotationAxis::Pitch,
            initial_angle: 0.0,
            start_time: 0.0,
            skew_sec: 0.0,
            paced: true,
            max_readings: None,
        }
    }
}

impl MockImcoderConfig {
    /// Reading number `k` of the simulated stream
    pub fn reading_at(&self, k: u64) -> ImcoderReading {
        let elapsed = k as f64 / self.frequency_hz;
        let angle = self.initial_angle + self.angular_rate * elapsed;
        let orientation = Quaternion::from_axis_angle(self.rotation_axis.unit_vector(), angle);
        ImcoderReading::new(self.side, self.start_time + self.skew_sec + elapsed, orientation)
            .with_seq(k)
    }
}

/// Mock imcoder source
///
/// Implements `ReadingSource`, generating readings in a background thread.
pub struct MockImcoderSource {
    name: String,
    config: MockImcoderConfig,
    listening: Arc<AtomicBool>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MockImcoderSource {
    pub fn new(name: impl Into<String>, config: MockImcoderConfig) -> Result<Self> {
        let name = name.into();
        if !(config.frequency_hz.is_finite() && config.frequency_hz > 0.0) {
            return Err(IngestionError::invalid_source(
                name,
                format!("frequency must be positive, got {}", config.frequency_hz),
            ));
        }
        if !config.angular_rate.is_finite() {
            return Err(IngestionError::invalid_source(name, "angular rate must be finite"));
        }

        Ok(Self {
            name,
            config,
            listening: Arc::new(AtomicBool::new(false)),
            thread_handle: Mutex::new(None),
        })
    }

    /// Wheel spinning at `angular_rate` rad/s on the given side
    pub fn wheel(
        name: impl Into<String>,
        side: WheelSide,
        angular_rate: f64,
        frequency_hz: f64,
    ) -> Result<Self> {
        Self::new(
            name,
            MockImcoderConfig {
                side,
                angular_rate,
                frequency_hz,
                ..Default::default()
            },
        )
    }

    pub fn config(&self) -> &MockImcoderConfig {
        &self.config
    }
}

impl ReadingSource for MockImcoderSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn side(&self) -> WheelSide {
        self.config.side
    }

    fn listen(&self, callback: ReadingCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = self.name.clone();
        let config = self.config.clone();
        let listening = self.listening.clone();
        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);

        let handle = thread::spawn(move || {
            debug!(
                source = %name,
                side = %config.side,
                frequency_hz = config.frequency_hz,
                angular_rate = config.angular_rate,
                "mock imcoder started"
            );

            let mut k: u64 = 0;
            while listening.load(Ordering::Relaxed) {
                if config.max_readings.is_some_and(|max| k >= max) {
                    break;
                }

                let reading = config.reading_at(k);
                callback(reading);
                trace!(source = %name, seq = k, timestamp = reading.timestamp, "mock reading sent");
                k += 1;

                if config.paced {
                    thread::sleep(interval);
                }
            }

            listening.store(false, Ordering::SeqCst);
            debug!(source = %name, readings = k, "mock imcoder stopped");
        });

        if let Ok(mut slot) = self.thread_handle.lock() {
            *slot = Some(handle);
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        let handle = self.thread_handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl Drop for MockImcoderSource {
    fn drop(&mut self) {
        self.stop();
    }
}
