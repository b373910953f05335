use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::info;
use newengine_timers::Scheduler;

use crate::config::FrameConfig;

/// Fixed-rate tick source for the timer scheduler.
///
/// Measures the real frame time, clamps it to `max_dt`, hands it to `Scheduler::tick`
/// once per frame, then sleeps out the rest of the frame budget.
pub struct FrameLoop {
    budget: Duration,
    max_dt: Duration,
    limit: Option<Duration>,
    stop: Arc<AtomicBool>,
}

impl FrameLoop {
    pub fn new(cfg: &FrameConfig) -> Self {
        Self {
            budget: cfg.frame_budget(),
            max_dt: cfg.max_dt(),
            limit: cfg.run_limit(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the loop on ctrl-c.
    pub fn stop_on_ctrlc(&self) -> anyhow::Result<()> {
        let stop = self.stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
        Ok(())
    }

    /// Run until ctrl-c or the configured run limit. Returns the number of frames ticked.
    pub fn run(&self, timers: &mut Scheduler) -> u64 {
        let started = Instant::now();
        let mut last = started;
        let mut frames: u64 = 0;

        while !self.stop.load(Ordering::Relaxed) {
            if self.limit.is_some_and(|l| started.elapsed() >= l) {
                break;
            }

            let now = Instant::now();
            let dt = now.duration_since(last).min(self.max_dt);
            last = now;
            frames += 1;

            timers.tick(dt);

            let spent = now.elapsed();
            if spent < self.budget {
                thread::sleep(self.budget - spent);
            }
        }

        info!("frame loop stopped after {frames} frames");
        frames
    }
}
