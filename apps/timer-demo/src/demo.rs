use std::rc::Rc;

use anyhow::Result;
use log::info;
use newengine_timers::{Scheduler, TimerCallback, TimerExt};

/// Populate the scheduler with one timer of every shape.
pub fn install(timers: &mut Scheduler) -> Result<()> {
    let on_once = TimerCallback::new(|_, fired| {
        info!("one-shot complete: {}", fired.payload::<&str>().copied().unwrap_or("-"));
    });
    timers.add_once(2.0, &on_once, Some(Rc::new("one-shot data")), false)?;

    let on_repeat = TimerCallback::new(|_, fired| {
        info!("bounded repeat: {}", fired.payload::<&str>().copied().unwrap_or("-"));
    });
    timers.add_repeat_n(1.0, 5, &on_repeat, Some(Rc::new("bounded repeat data")), false)?;

    let on_infinite = TimerCallback::new(|_, _| info!("infinite repeat"));
    let infinite = timers.add_repeat(0.5, &on_infinite, None, false)?;

    let on_unscaled = TimerCallback::new(|_, fired| {
        info!("unscaled one-shot: {}", fired.payload::<&str>().copied().unwrap_or("-"));
    });
    timers.add_once(3.0, &on_unscaled, Some(Rc::new("ignores time scale")), true)?;

    // Pause the infinite timer after 3s and bring it back 2s later. A paused timer is
    // reclaimed on the next tick, so the resume path re-creates it when the handle is gone.
    let pause_then_resume = TimerCallback::new(move |timers, _| {
        info!("pausing infinite timer");
        timers.pause(infinite);

        let on_infinite = on_infinite.clone();
        let resume = TimerCallback::new(move |timers, _| {
            if timers.resume(infinite) {
                info!("infinite timer resumed");
                return;
            }
            match timers.add_repeat(0.5, &on_infinite, None, false) {
                Ok(_) => info!("infinite timer re-created"),
                Err(e) => log::error!("failed to re-create infinite timer: {e}"),
            }
        });
        if let Err(e) = timers.add_once(2.0, &resume, None, false) {
            log::error!("failed to schedule resume: {e}");
        }
    });
    timers.add_once(3.0, &pause_then_resume, None, false)?;

    timers.add_countdown(
        5.0,
        |left| {
            if left.fract() < 0.02 {
                info!("countdown: {left:.1}s left");
            }
        },
        || info!("countdown finished"),
        false,
    )?;

    let on_next = TimerCallback::new(|timers, _| {
        info!("first frame; {} timers active", timers.active_timer_count());
    });
    timers.add_next_frame(&on_next, None)?;

    let on_frames = TimerCallback::new(|timers, _| timers.log_active_timers());
    timers.add_frames(30, &on_frames, None, false)?;

    Ok(())
}
