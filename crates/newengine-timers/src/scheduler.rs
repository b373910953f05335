use crate::callback::{CallbackId, Fired, Payload, TimerCallback};
use crate::config::SchedulerConfig;
use crate::entity::{TimerEntity, REPEAT_FOREVER};
use crate::error::{TimerError, TimerResult};
use crate::handle::TimerHandle;
use crate::pool::Pool;

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::Duration;

struct Slot {
    generation: u32,
    entity: Option<TimerEntity>,
}

/// Per-frame timer scheduler.
///
/// One instance per application, owned by the host and ticked once per frame from the
/// engine thread. It is `!Send` on purpose: callbacks are `Rc`-based and run synchronously
/// inside [`Scheduler::tick`].
///
/// Update pass contract:
/// - timers are visited from the most recently created to the oldest, each at most once;
/// - a timer created during a pass is first advanced on the following tick;
/// - a timer removed during a pass is not advanced for the rest of that pass;
/// - paused and exhausted timers are reclaimed to the pool on the next tick.
///
/// A panicking callback aborts the remainder of the current pass. The scheduler does not
/// catch it; recovery is the host's decision. If the host catches the unwind, later ticks
/// run normally.
pub struct Scheduler {
    config: SchedulerConfig,
    pool: Pool<TimerEntity>,

    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    live: usize,

    active: Vec<TimerHandle>,
    by_callback: HashMap<CallbackId, TimerHandle>,

    time_scale: f32,
    delta: Duration,
    unscaled_delta: Duration,
    elapsed: Duration,
    unscaled_elapsed: Duration,

    updating: bool,
    // Bumped by `shutdown`; an update pass stops when it changes underneath it.
    epoch: u64,
}

impl Default for Scheduler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let time_scale = clamp_scale(config.time_scale);
        Self {
            pool: Pool::with_reset(config.initial_pool_capacity, TimerEntity::reset),
            config,
            slots: Vec::new(),
            free_slots: Vec::new(),
            live: 0,
            active: Vec::new(),
            by_callback: HashMap::new(),
            time_scale,
            delta: Duration::ZERO,
            unscaled_delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            unscaled_elapsed: Duration::ZERO,
            updating: false,
            epoch: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /* ============================
       Lifecycle
       ============================ */

    /// Release every timer and zero the elapsed-time counters.
    pub fn initialize(&mut self) {
        self.shutdown();
        self.elapsed = Duration::ZERO;
        self.unscaled_elapsed = Duration::ZERO;
    }

    /// Release every active timer back to the pool. Idempotent.
    ///
    /// Called from inside a callback, it also ends the current update pass.
    pub fn shutdown(&mut self) {
        let released = self.live;

        let handles = std::mem::take(&mut self.active);
        for handle in handles {
            self.release(handle);
        }
        self.by_callback.clear();
        self.epoch = self.epoch.wrapping_add(1);

        if released > 0 {
            debug!("timer scheduler shutdown: released {released} timer(s)");
        }
    }

    /// Full restart with the pool retained.
    #[inline]
    pub fn clear_all_timers(&mut self) {
        self.initialize();
    }

    /* ============================
       Create / remove / lookup
       ============================ */

    /// Schedule `callback` to fire every `interval`, `repeat` times (`-1` = forever).
    ///
    /// The new timer is running immediately. It becomes the indexed timer for its callback,
    /// shadowing any earlier timer that shares the same callback.
    pub fn create_timer(
        &mut self,
        interval: Duration,
        repeat: i32,
        callback: &TimerCallback,
        payload: Option<Payload>,
        use_unscaled_time: bool,
    ) -> TimerResult<TimerHandle> {
        if repeat == 0 || repeat < REPEAT_FOREVER {
            error!("[TimerSystem] repeat must be -1 (infinite) or > 0, got: {repeat}");
            return Err(TimerError::InvalidRepeat(repeat));
        }

        let mut entity = self.pool.acquire();
        entity.initialize(interval, repeat, callback.clone(), payload, use_unscaled_time);

        let handle = self.insert(entity);
        self.active.push(handle);
        self.by_callback.insert(callback.id(), handle);

        Ok(handle)
    }

    /// Stop `handle` for good and return it to the pool.
    ///
    /// Returns `false` for a stale or unknown handle.
    pub fn remove_timer(&mut self, handle: TimerHandle) -> bool {
        let Some(entity) = self.entity_mut(handle) else {
            return false;
        };
        entity.pause();

        // During a pass the stale entry stays in place and is swept when the cursor reaches it,
        // so indices below the cursor never shift.
        if !self.updating {
            if let Some(pos) = self.active.iter().position(|h| *h == handle) {
                self.active.remove(pos);
            }
        }

        self.unindex(handle);
        self.release(handle);
        true
    }

    /// The indexed timer for `callback`, if it is currently running.
    pub fn find_timer(&self, callback: impl Into<CallbackId>) -> Option<TimerHandle> {
        let handle = *self.by_callback.get(&callback.into())?;
        self.entity(handle)
            .filter(|e| e.is_running())
            .map(|_| handle)
    }

    /// Pause the indexed timer for `callback`. Returns `false` if there is none.
    pub fn pause_by_callback(&mut self, callback: impl Into<CallbackId>) -> bool {
        match self.by_callback.get(&callback.into()).copied() {
            Some(handle) => self.pause(handle),
            None => false,
        }
    }

    /// Resume the indexed timer for `callback`. Returns `false` if there is none.
    pub fn resume_by_callback(&mut self, callback: impl Into<CallbackId>) -> bool {
        match self.by_callback.get(&callback.into()).copied() {
            Some(handle) => self.resume(handle),
            None => false,
        }
    }

    /* ============================
       Handle control / queries
       ============================ */

    #[inline]
    pub fn pause(&mut self, handle: TimerHandle) -> bool {
        self.entity_mut(handle).map(TimerEntity::pause).is_some()
    }

    #[inline]
    pub fn resume(&mut self, handle: TimerHandle) -> bool {
        self.entity_mut(handle).map(TimerEntity::resume).is_some()
    }

    /// `true` while the handle still addresses a timer owned by this scheduler.
    #[inline]
    pub fn is_alive(&self, handle: TimerHandle) -> bool {
        self.entity(handle).is_some()
    }

    #[inline]
    pub fn is_running(&self, handle: TimerHandle) -> bool {
        self.entity(handle).is_some_and(TimerEntity::is_running)
    }

    /// Read-only view of a live timer.
    #[inline]
    pub fn timer(&self, handle: TimerHandle) -> Option<&TimerEntity> {
        self.entity(handle)
    }

    #[inline]
    pub fn active_timer_count(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn pool_free_count(&self) -> usize {
        self.pool.free_count()
    }

    /* ============================
       Time
       ============================ */

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Clamped to `>= 0`. Zero freezes scaled-time timers without pausing them.
    #[inline]
    pub fn set_time_scale(&mut self, value: f32) {
        self.time_scale = clamp_scale(value);
    }

    /// Scaled delta of the last tick.
    #[inline]
    pub fn delta_time(&self) -> Duration {
        self.delta
    }

    #[inline]
    pub fn unscaled_delta_time(&self) -> Duration {
        self.unscaled_delta
    }

    /// Scaled time accumulated since the last `initialize`.
    #[inline]
    pub fn elapsed_time(&self) -> Duration {
        self.elapsed
    }

    #[inline]
    pub fn unscaled_elapsed_time(&self) -> Duration {
        self.unscaled_elapsed
    }

    /* ============================
       Frame entry point
       ============================ */

    /// Advance all timers by one frame of `raw_unscaled_delta` real time.
    ///
    /// Must be called exactly once per frame by the host. A call from inside a timer
    /// callback is ignored.
    pub fn tick(&mut self, raw_unscaled_delta: Duration) {
        if self.updating {
            warn!("[TimerSystem] tick called from inside a timer callback; ignored");
            return;
        }

        self.unscaled_delta = raw_unscaled_delta;
        self.delta = scale_duration(raw_unscaled_delta, self.time_scale);

        self.unscaled_elapsed = self.unscaled_elapsed.saturating_add(self.unscaled_delta);
        self.elapsed = self.elapsed.saturating_add(self.delta);

        let pass = PassGuard::begin(self);
        pass.0.update_timers();
    }

    fn update_timers(&mut self) {
        let epoch = self.epoch;

        let mut i = self.active.len();
        while i > 0 {
            i -= 1;
            let handle = self.active[i];

            let (running, unscaled) = match self.entity(handle) {
                Some(e) => (e.is_running(), e.uses_unscaled_time()),
                None => {
                    // Removed earlier in this pass (or a slot recycled since).
                    self.active.remove(i);
                    continue;
                }
            };

            if !running {
                self.active.remove(i);
                self.unindex(handle);
                self.release(handle);
                continue;
            }

            let delta = if unscaled { self.unscaled_delta } else { self.delta };
            let Some(firing) = self.entity_mut(handle).and_then(|e| e.advance(delta)) else {
                continue;
            };

            let fired = Fired {
                handle,
                payload: firing.payload.as_deref(),
            };
            let ran = firing.callback.invoke(self, &fired);

            if self.epoch != epoch {
                // shutdown/clear from inside the callback: `active` no longer matches the cursor.
                return;
            }
            if !ran {
                continue;
            }

            match self.entity_mut(handle) {
                Some(e) => e.settle_firing(),
                None => {
                    // The callback removed its own timer.
                    if self.active.get(i) == Some(&handle) {
                        self.active.remove(i);
                    }
                }
            }
        }
    }

    /* ============================
       Diagnostics
       ============================ */

    pub fn log_active_timers(&self) {
        info!("[TimerSystem] Active Timers: {}", self.live);
        for &handle in self.active.iter() {
            let Some(e) = self.entity(handle) else {
                continue;
            };
            info!(
                "  - callback={:?}, Remaining: {}, Interval: {:.2}s, running={}",
                e.callback_id().map(CallbackId::to_u64),
                e.remaining_repeats(),
                e.interval().as_secs_f32(),
                e.is_running()
            );
        }
    }

    /* ============================
       Slot storage
       ============================ */

    fn insert(&mut self, entity: TimerEntity) -> TimerHandle {
        self.live += 1;

        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            return TimerHandle::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            entity: Some(entity),
        });
        TimerHandle::new(index, 0)
    }

    /// Move the entity back to the pool and retire the handle's generation.
    fn release(&mut self, handle: TimerHandle) {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return;
        };
        if slot.generation != handle.generation() {
            return;
        }
        let Some(entity) = slot.entity.take() else {
            return;
        };

        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.index() as u32);
        self.live -= 1;
        self.pool.release(entity);
    }

    /// Drop the callback-index entry, but only if it still points at this exact timer.
    fn unindex(&mut self, handle: TimerHandle) {
        let Some(id) = self.entity(handle).and_then(TimerEntity::callback_id) else {
            return;
        };
        if self.by_callback.get(&id) == Some(&handle) {
            self.by_callback.remove(&id);
        }
    }

    #[inline]
    fn entity(&self, handle: TimerHandle) -> Option<&TimerEntity> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entity.as_ref()
    }

    #[inline]
    fn entity_mut(&mut self, handle: TimerHandle) -> Option<&mut TimerEntity> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entity.as_mut()
    }
}

/// Marks an update pass in progress; cleared on drop, including when a callback unwinds.
struct PassGuard<'a>(&'a mut Scheduler);

impl<'a> PassGuard<'a> {
    #[inline]
    fn begin(scheduler: &'a mut Scheduler) -> Self {
        scheduler.updating = true;
        Self(scheduler)
    }
}

impl Drop for PassGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.0.updating = false;
    }
}

#[inline]
fn clamp_scale(value: f32) -> f32 {
    // `max` maps NaN to 0.
    value.max(0.0)
}

#[inline]
fn scale_duration(d: Duration, scale: f32) -> Duration {
    if scale == 1.0 {
        return d;
    }
    Duration::try_from_secs_f64(d.as_secs_f64() * f64::from(scale)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn counter() -> (Rc<Cell<u32>>, TimerCallback) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let cb = TimerCallback::new(move |_, _| h.set(h.get() + 1));
        (hits, cb)
    }

    #[test]
    fn invalid_repeat_is_rejected_without_side_effects() {
        let mut s = Scheduler::new();
        let (_, cb) = counter();

        for bad in [0, -2, i32::MIN] {
            let err = s.create_timer(ms(10), bad, &cb, None, false).unwrap_err();
            assert!(matches!(err, TimerError::InvalidRepeat(v) if v == bad));
        }

        assert_eq!(s.active_timer_count(), 0);
        assert_eq!(s.pool_free_count(), 20);
        assert!(s.find_timer(&cb).is_none());
    }

    #[test]
    fn stale_handle_is_ignored_after_slot_reuse() {
        let mut s = Scheduler::new();
        let (_, a) = counter();
        let (b_hits, b) = counter();

        let old = s.create_timer(ms(10), 1, &a, None, false).unwrap();
        assert!(s.remove_timer(old));

        let new = s.create_timer(ms(10), REPEAT_FOREVER, &b, None, false).unwrap();
        assert_ne!(old, new);

        assert!(!s.remove_timer(old));
        assert!(!s.pause(old));
        assert!(s.is_running(new));

        s.tick(ms(10));
        assert_eq!(b_hits.get(), 1);
    }

    #[test]
    fn paused_timer_is_reclaimed_on_next_tick() {
        let mut s = Scheduler::new();
        let (hits, cb) = counter();

        let h = s.create_timer(ms(100), REPEAT_FOREVER, &cb, None, false).unwrap();
        assert!(s.pause_by_callback(&cb));
        assert!(s.find_timer(&cb).is_none());

        s.tick(ms(100));

        assert_eq!(hits.get(), 0);
        assert!(!s.is_alive(h));
        assert_eq!(s.active_timer_count(), 0);
        assert!(!s.resume_by_callback(&cb));
    }

    #[test]
    fn exhausted_timer_returns_to_pool() {
        let mut s = Scheduler::new();
        let (hits, cb) = counter();

        let h = s.create_timer(ms(10), 2, &cb, None, false).unwrap();
        assert_eq!(s.pool_free_count(), 19);

        s.tick(ms(10));
        s.tick(ms(10));
        assert_eq!(hits.get(), 2);
        assert!(s.is_alive(h));
        assert!(!s.is_running(h));

        s.tick(ms(10));
        assert!(!s.is_alive(h));
        assert_eq!(s.pool_free_count(), 20);
    }

    #[test]
    fn time_scale_is_clamped() {
        let mut s = Scheduler::new();

        s.set_time_scale(-3.0);
        assert_eq!(s.time_scale(), 0.0);

        s.set_time_scale(f32::NAN);
        assert_eq!(s.time_scale(), 0.0);

        s.set_time_scale(2.0);
        s.tick(ms(100));
        assert_eq!(s.delta_time(), ms(200));
        assert_eq!(s.unscaled_delta_time(), ms(100));
        assert_eq!(s.elapsed_time(), ms(200));
        assert_eq!(s.unscaled_elapsed_time(), ms(100));
    }

    #[test]
    fn clear_all_timers_resets_counters_and_keeps_pool() {
        let mut s = Scheduler::new();
        let (hits, cb) = counter();

        s.create_timer(ms(10), REPEAT_FOREVER, &cb, None, false).unwrap();
        s.create_timer(ms(10), REPEAT_FOREVER, &cb, None, false).unwrap();
        s.tick(ms(5));

        s.clear_all_timers();
        s.clear_all_timers();

        assert_eq!(s.active_timer_count(), 0);
        assert_eq!(s.pool_free_count(), 20);
        assert_eq!(s.elapsed_time(), Duration::ZERO);
        assert_eq!(s.unscaled_elapsed_time(), Duration::ZERO);
        assert!(s.find_timer(&cb).is_none());

        s.tick(ms(10));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn panicking_callback_does_not_wedge_later_ticks() {
        let mut s = Scheduler::new();
        let (hits, cb) = counter();
        s.create_timer(ms(10), REPEAT_FOREVER, &cb, None, false).unwrap();

        let panicked = Rc::new(Cell::new(false));
        let p = panicked.clone();
        let bomb = TimerCallback::new(move |_, _| {
            if !p.replace(true) {
                panic!("callback failure");
            }
        });
        s.create_timer(ms(10), 1, &bomb, None, false).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| s.tick(ms(10))));
        assert!(outcome.is_err());
        assert_eq!(hits.get(), 0);

        for _ in 0..3 {
            s.tick(ms(10));
        }

        assert_eq!(hits.get(), 3);
        assert_eq!(s.unscaled_elapsed_time(), ms(40));
        assert!(s.find_timer(&bomb).is_none());
    }

    #[test]
    fn reentrant_tick_is_ignored() {
        let mut s = Scheduler::new();
        let nested = Rc::new(Cell::new(0u32));
        let n = nested.clone();

        let cb = TimerCallback::new(move |s, _| {
            n.set(n.get() + 1);
            s.tick(Duration::from_secs(10));
        });
        s.create_timer(ms(10), REPEAT_FOREVER, &cb, None, false).unwrap();

        s.tick(ms(10));

        assert_eq!(nested.get(), 1);
        assert_eq!(s.unscaled_elapsed_time(), ms(10));
    }

    #[test]
    fn shutdown_inside_callback_ends_the_pass() {
        let mut s = Scheduler::new();
        let (older_hits, older) = counter();
        s.create_timer(ms(10), REPEAT_FOREVER, &older, None, false).unwrap();

        let late_hits = Rc::new(Cell::new(0u32));
        let l = late_hits.clone();
        let late = TimerCallback::new(move |_, _| l.set(l.get() + 1));

        let stopper = TimerCallback::new(move |s, _| {
            s.shutdown();
            s.create_timer(Duration::ZERO, 1, &late, None, false).unwrap();
        });
        s.create_timer(ms(10), 1, &stopper, None, false).unwrap();

        s.tick(ms(10));
        assert_eq!(older_hits.get(), 0);
        assert_eq!(late_hits.get(), 0);
        assert_eq!(s.active_timer_count(), 1);

        s.tick(ms(10));
        assert_eq!(late_hits.get(), 1);
    }
}
