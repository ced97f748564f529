//! Replay Source - 从录制文件回放 imcoder 读数
//!
//! 录制文件为 JSONL，每行一个读数：
//!
//! ```text
//! {"side":"left","timestamp":12.30,"seq":7,"orientation":{"x":0.0,"y":0.12,"z":0.0,"w":0.99}}
//! ```
//!
//! 空行和以 `#` 开头的行被忽略。

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{ImcoderReading, ReadingCallback, ReadingSource, WheelSide};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// 一份已加载的录制，按时间戳排序
#[derive(Debug, Clone)]
pub struct Recording {
    path: PathBuf,
    readings: Vec<ImcoderReading>,
}

impl Recording {
    /// 从 JSONL 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IngestionError::RecordingIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, BufReader::new(file))
    }

    /// 从任意 reader 解析，`path` 仅用于错误信息
    pub fn from_reader(path: impl AsRef<Path>, reader: impl BufRead) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut readings = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| IngestionError::RecordingIo {
                path: path.clone(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let reading: ImcoderReading =
                serde_json::from_str(trimmed).map_err(|e| IngestionError::RecordingParse {
                    path: path.clone(),
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            readings.push(reading);
        }

        Ok(Self::from_readings(path, readings))
    }

    /// 直接由读数构建（稳定排序）
    pub fn from_readings(path: impl Into<PathBuf>, mut readings: Vec<ImcoderReading>) -> Self {
        readings.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            path: path.into(),
            readings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 两侧合并后的读数
    pub fn readings(&self) -> &[ImcoderReading] {
        &self.readings
    }

    /// 某一侧的读数
    pub fn side(&self, side: WheelSide) -> Vec<ImcoderReading> {
        self.readings
            .iter()
            .filter(|r| r.side == side)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// 首尾时间戳之差
    pub fn span(&self) -> f64 {
        match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// 循环回放时每一轮的时间偏移
    ///
    /// 整份录制共用同一个值，两侧在循环后依然对齐。
    pub fn loop_period(&self) -> f64 {
        let n = self.readings.len();
        if n < 2 {
            return 1.0;
        }
        let span = self.span();
        span + span / (n - 1) as f64
    }
}

/// Replay 配置
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 回放速度倍率 (1.0 = 原速, 0 = 不等待)
    pub speed_multiplier: f64,

    /// 是否循环回放
    pub loop_playback: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            loop_playback: false,
        }
    }
}

/// Replay Source - 回放录制中某一侧的读数
pub struct ReplaySource {
    name: String,
    side: WheelSide,
    readings: Arc<Vec<ImcoderReading>>,
    loop_period: f64,
    config: ReplayConfig,
    listening: Arc<AtomicBool>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySource {
    /// 从录制中取出一侧
    pub fn new(
        name: impl Into<String>,
        side: WheelSide,
        recording: &Recording,
        config: ReplayConfig,
    ) -> Result<Self> {
        let name = name.into();
        let speed = config.speed_multiplier;
        if !speed.is_finite() || speed < 0.0 {
            return Err(IngestionError::invalid_source(
                name,
                format!("speed multiplier must be >= 0, got {speed}"),
            ));
        }

        let readings = recording.side(side);
        if readings.is_empty() {
            return Err(IngestionError::EmptyRecording {
                path: recording.path().to_path_buf(),
                side: side.to_string(),
            });
        }

        info!(
            source = %name,
            side = %side,
            readings = readings.len(),
            "loaded replay source"
        );

        Ok(Self {
            name,
            side,
            readings: Arc::new(readings),
            loop_period: recording.loop_period(),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            thread_handle: Mutex::new(None),
        })
    }

    /// 加载文件并取出一侧
    pub fn load(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        side: WheelSide,
        config: ReplayConfig,
    ) -> Result<Self> {
        let recording = Recording::load(path)?;
        Self::new(name, side, &recording, config)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl ReadingSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn side(&self) -> WheelSide {
        self.side
    }

    fn listen(&self, callback: ReadingCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let listening = self.listening.clone();
        let name = self.name.clone();
        let readings = self.readings.clone();
        let speed = self.config.speed_multiplier;
        let loop_playback = self.config.loop_playback;
        let loop_period = self.loop_period;

        let handle = thread::spawn(move || {
            debug!(source = %name, "replay thread started");

            let Some(first) = readings.first().map(|r| r.timestamp) else {
                warn!(source = %name, "no readings to replay");
                listening.store(false, Ordering::SeqCst);
                return;
            };
            let start_time = Instant::now();
            let mut offset = 0.0;
            let mut round: u64 = 0;

            loop {
                for reading in readings.iter() {
                    if !listening.load(Ordering::Relaxed) {
                        debug!(source = %name, "replay stopped");
                        return;
                    }

                    let mut reading = *reading;
                    reading.timestamp += offset;

                    // 按原始时间间隔等待
                    if speed > 0.0 {
                        let target = Duration::from_secs_f64((reading.timestamp - first) / speed);
                        let elapsed = start_time.elapsed();
                        if target > elapsed {
                            thread::sleep(target - elapsed);
                        }
                    }

                    callback(reading);
                }

                if !loop_playback {
                    info!(source = %name, "replay completed");
                    break;
                }

                round += 1;
                offset = loop_period * round as f64;
                debug!(source = %name, round, "looping replay");
            }

            listening.store(false, Ordering::SeqCst);
        });

        if let Ok(mut slot) = self.thread_handle.lock() {
            *slot = Some(handle);
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);

        // 等待线程结束
        let handle = self.thread_handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}
