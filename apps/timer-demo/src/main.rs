mod config;
mod demo;
mod frame_loop;

use std::env;

use anyhow::Result;
use log::{info, warn};
use newengine_modules_logging::{init_console_logger, ConsoleLoggerConfig};
use newengine_timers::Scheduler;

use crate::{config::DemoConfig, frame_loop::FrameLoop};

fn main() -> Result<()> {
    init_console_logger(&ConsoleLoggerConfig::from_env())?;

    let cfg = match env::args().nth(1) {
        Some(path) => DemoConfig::load_toml(path)?,
        None => DemoConfig::default(),
    };

    let frames = FrameLoop::new(&cfg.frame);
    if let Err(e) = frames.stop_on_ctrlc() {
        warn!("ctrl-c handler not installed: {e}");
    }

    let mut timers = Scheduler::with_config(cfg.timers.clone());
    demo::install(&mut timers)?;

    frames.run(&mut timers);

    info!(
        "timer demo stopped after {:.2}s (scaled {:.2}s)",
        timers.unscaled_elapsed_time().as_secs_f32(),
        timers.elapsed_time().as_secs_f32()
    );
    timers.shutdown();
    Ok(())
}
