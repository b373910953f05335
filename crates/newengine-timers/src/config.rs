use crate::error::{TimerError, TimerResult};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Timer instances created up front.
    #[serde(default = "default_pool_capacity")]
    pub initial_pool_capacity: usize,
    /// Initial scale applied to scaled-time timers. Clamped to `>= 0`.
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    /// Frame rate assumed by frame-count delays.
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u32,
    /// Tick interval of countdown timers.
    #[serde(default = "default_countdown_interval_ms")]
    pub countdown_interval_ms: u32,
}

fn default_pool_capacity() -> usize { 20 }
fn default_time_scale() -> f32 { 1.0 }
fn default_frame_rate_hz() -> u32 { 60 }
fn default_countdown_interval_ms() -> u32 { 16 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_pool_capacity: default_pool_capacity(),
            time_scale: default_time_scale(),
            frame_rate_hz: default_frame_rate_hz(),
            countdown_interval_ms: default_countdown_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(text: &str) -> TimerResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_toml(path: impl AsRef<Path>) -> TimerResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TimerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Duration of one frame at `frame_rate_hz` (a zero rate is treated as 1 Hz).
    #[inline]
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate_hz.max(1)
    }

    #[inline]
    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.countdown_interval_ms))
    }
}
