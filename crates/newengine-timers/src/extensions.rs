use crate::callback::{Payload, TimerCallback};
use crate::entity::REPEAT_FOREVER;
use crate::error::{TimerError, TimerResult};
use crate::handle::TimerHandle;
use crate::scheduler::Scheduler;

use log::error;
use std::time::Duration;

/// Shape-specific constructors over [`Scheduler::create_timer`].
///
/// Seconds are given as `f32`, the way gameplay code usually holds them; negative or
/// non-finite values are rejected with [`TimerError::InvalidInterval`].
pub trait TimerExt {
    /// Fire once after `seconds`.
    fn add_once(
        &mut self,
        seconds: f32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>;

    /// Fire every `seconds` until paused or removed.
    fn add_repeat(
        &mut self,
        seconds: f32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>;

    /// Fire every `seconds`, `count` times.
    fn add_repeat_n(
        &mut self,
        seconds: f32,
        count: i32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>;

    /// Fire once on the next tick.
    fn add_next_frame(
        &mut self,
        callback: &TimerCallback,
        payload: Option<Payload>,
    ) -> TimerResult<TimerHandle>;

    /// Fire once after `frames` frames at the configured frame rate.
    fn add_frames(
        &mut self,
        frames: u32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>;

    /// Count `total_seconds` down frame by frame.
    ///
    /// `on_tick` receives the remaining seconds (clamped at zero). When they reach zero,
    /// `on_complete` runs and the countdown removes itself.
    fn add_countdown<T, C>(
        &mut self,
        total_seconds: f32,
        on_tick: T,
        on_complete: C,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>
    where
        T: FnMut(f32) + 'static,
        C: FnOnce() + 'static;
}

impl TimerExt for Scheduler {
    fn add_once(
        &mut self,
        seconds: f32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle> {
        let interval = seconds_to_interval(seconds)?;
        self.create_timer(interval, 1, callback, payload, use_unscaled_time)
    }

    fn add_repeat(
        &mut self,
        seconds: f32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle> {
        let interval = seconds_to_interval(seconds)?;
        self.create_timer(interval, REPEAT_FOREVER, callback, payload, use_unscaled_time)
    }

    fn add_repeat_n(
        &mut self,
        seconds: f32,
        count: i32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle> {
        let interval = seconds_to_interval(seconds)?;
        self.create_timer(interval, count, callback, payload, use_unscaled_time)
    }

    fn add_next_frame(
        &mut self,
        callback: &TimerCallback,
        payload: Option<Payload>,
    ) -> TimerResult<TimerHandle> {
        self.create_timer(Duration::ZERO, 1, callback, payload, false)
    }

    fn add_frames(
        &mut self,
        frames: u32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle> {
        let interval = self
            .config()
            .frame_duration()
            .checked_mul(frames)
            .unwrap_or(Duration::MAX);
        self.create_timer(interval, 1, callback, payload, use_unscaled_time)
    }

    fn add_countdown<T, C>(
        &mut self,
        total_seconds: f32,
        mut on_tick: T,
        on_complete: C,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle>
    where
        T: FnMut(f32) + 'static,
        C: FnOnce() + 'static,
    {
        seconds_to_interval(total_seconds)?;

        let mut remaining = total_seconds;
        let mut on_complete = Some(on_complete);

        let countdown = TimerCallback::new(move |scheduler, fired| {
            let frame = if use_unscaled_time {
                scheduler.unscaled_delta_time()
            } else {
                scheduler.delta_time()
            };

            remaining = (remaining - frame.as_secs_f32()).max(0.0);
            on_tick(remaining);

            if remaining <= 0.0 {
                if let Some(done) = on_complete.take() {
                    done();
                }
                scheduler.remove_timer(fired.handle);
            }
        });

        let interval = self.config().countdown_interval();
        self.create_timer(interval, REPEAT_FOREVER, &countdown, None, use_unscaled_time)
    }
}

fn seconds_to_interval(seconds: f32) -> TimerResult<Duration> {
    Duration::try_from_secs_f32(seconds).map_err(|_| {
        error!("[TimerSystem] Interval cannot be negative or non-finite: {seconds}");
        TimerError::InvalidInterval(seconds)
    })
}
