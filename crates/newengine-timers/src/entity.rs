use crate::callback::{CallbackId, Payload, TimerCallback};

use std::time::Duration;

/// Repeat count for a timer that fires until paused or removed.
pub const REPEAT_FOREVER: i32 = -1;

/// One scheduled unit of work.
///
/// `Default` is the reset (inert) state: zero interval, zero repeats, no callback, not running.
/// Entities are recycled through the pool and are never destroyed individually.
#[derive(Default)]
pub struct TimerEntity {
    interval: Duration,
    elapsed: Duration,
    /// `-1` infinite, `> 0` finite countdown, `0` exhausted (never a valid input).
    remaining: i32,
    running: bool,
    unscaled: bool,
    callback: Option<TimerCallback>,
    payload: Option<Payload>,
}

/// A due firing produced by [`TimerEntity::advance`].
pub(crate) struct Firing {
    pub callback: TimerCallback,
    pub payload: Option<Payload>,
}

impl TimerEntity {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a reset entity live.
    ///
    /// `repeat` must be [`REPEAT_FOREVER`] or positive; the scheduler validates it before
    /// an entity is ever initialized.
    pub fn initialize(
        &mut self,
        interval: Duration,
        repeat: i32,
        callback: TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) {
        debug_assert!(repeat == REPEAT_FOREVER || repeat > 0);

        self.interval = interval;
        self.remaining = repeat;
        self.callback = Some(callback);
        self.payload = payload;
        self.unscaled = use_unscaled_time;
        self.elapsed = Duration::ZERO;
        self.running = true;
    }

    /// Accumulate `delta` and report whether the timer is due.
    ///
    /// On a due firing the accumulator is zeroed and the callback/payload are returned for
    /// the caller to invoke exactly once; the caller then calls [`Self::settle_firing`].
    /// The split lets the callback borrow the owning scheduler mutably.
    pub(crate) fn advance(&mut self, delta: Duration) -> Option<Firing> {
        if !self.running {
            return None;
        }

        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed < self.interval {
            return None;
        }

        self.elapsed = Duration::ZERO;

        let callback = self.callback.clone()?;
        Some(Firing {
            callback,
            payload: self.payload.clone(),
        })
    }

    /// Count down one repetition after the callback ran.
    pub(crate) fn settle_firing(&mut self) {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.running = false;
            }
        }
    }

    /// Stop accumulating, regardless of remaining repeats.
    #[inline]
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Continue accumulating from the paused elapsed value.
    ///
    /// An exhausted timer stays stopped; it must be initialized again.
    #[inline]
    pub fn resume(&mut self) {
        if self.remaining != 0 {
            self.running = true;
        }
    }

    /// Back to the inert pool state. Drops the callback and payload references.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    #[inline]
    pub fn uses_unscaled_time(&self) -> bool {
        self.unscaled
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[inline]
    pub fn remaining_repeats(&self) -> i32 {
        self.remaining
    }

    #[inline]
    pub fn callback_id(&self) -> Option<CallbackId> {
        self.callback.as_ref().map(TimerCallback::id)
    }

    #[inline]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn live(interval: Duration, repeat: i32) -> TimerEntity {
        let mut e = TimerEntity::new();
        e.initialize(interval, repeat, TimerCallback::new(|_, _| {}), None, false);
        e
    }

    /// Advance and settle the way the scheduler does, counting firings.
    fn drive(e: &mut TimerEntity, delta: Duration) -> bool {
        match e.advance(delta) {
            Some(_) => {
                e.settle_firing();
                true
            }
            None => false,
        }
    }

    #[test]
    fn fires_only_when_interval_is_reached() {
        let mut e = live(ms(1000), 1);

        assert!(!drive(&mut e, ms(500)));
        assert_eq!(e.elapsed(), ms(500));
        assert!(drive(&mut e, ms(500)));
        assert_eq!(e.elapsed(), Duration::ZERO);
        assert!(!e.is_running());
        assert!(e.is_exhausted());
        assert!(!drive(&mut e, ms(500)));
    }

    #[test]
    fn infinite_never_exhausts() {
        let mut e = live(ms(100), REPEAT_FOREVER);

        let fired = (0..50).filter(|_| drive(&mut e, ms(100))).count();

        assert_eq!(fired, 50);
        assert!(e.is_running());
        assert_eq!(e.remaining_repeats(), REPEAT_FOREVER);
    }

    #[test]
    fn pause_keeps_elapsed_and_resume_continues() {
        let mut e = live(ms(1000), 2);

        assert!(!drive(&mut e, ms(600)));
        e.pause();
        e.pause();
        assert!(!drive(&mut e, ms(600)));
        assert_eq!(e.elapsed(), ms(600));

        e.resume();
        assert!(e.is_running());
        assert!(drive(&mut e, ms(400)));
    }

    #[test]
    fn exhausted_timer_cannot_resume() {
        let mut e = live(ms(10), 1);

        assert!(drive(&mut e, ms(10)));
        e.resume();

        assert!(!e.is_running());
    }

    #[test]
    fn reset_clears_everything() {
        let mut e = TimerEntity::new();
        e.initialize(
            ms(250),
            3,
            TimerCallback::new(|_, _| {}),
            Some(std::rc::Rc::new(7u32)),
            true,
        );

        e.reset();

        assert_eq!(e.interval(), Duration::ZERO);
        assert_eq!(e.elapsed(), Duration::ZERO);
        assert_eq!(e.remaining_repeats(), 0);
        assert!(!e.is_running());
        assert!(!e.uses_unscaled_time());
        assert!(e.callback_id().is_none());
        assert!(!e.has_payload());
    }
}
