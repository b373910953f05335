use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use newengine_timers::SchedulerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub timers: SchedulerConfig,
}

impl DemoConfig {
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading demo config '{}'", path.display()))?;
        let cfg: DemoConfig = toml::from_str(&text)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    #[serde(default = "default_target_hz")]
    pub target_hz: u32,
    #[serde(default = "default_max_dt_ms")]
    pub max_dt_ms: u32,
    /// Stop after this many seconds of wall time. `0` runs until ctrl-c.
    #[serde(default = "default_run_seconds")]
    pub run_seconds: f32,
}

fn default_target_hz() -> u32 { 60 }
fn default_max_dt_ms() -> u32 { 250 }
fn default_run_seconds() -> f32 { 8.0 }

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_hz: default_target_hz(),
            max_dt_ms: default_max_dt_ms(),
            run_seconds: default_run_seconds(),
        }
    }
}

impl FrameConfig {
    #[inline]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.target_hz.max(1)
    }

    #[inline]
    pub fn max_dt(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_dt_ms.max(1)))
    }

    #[inline]
    pub fn run_limit(&self) -> Option<Duration> {
        Duration::try_from_secs_f32(self.run_seconds)
            .ok()
            .filter(|d| !d.is_zero())
    }
}
