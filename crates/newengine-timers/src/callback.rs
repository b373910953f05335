use crate::handle::TimerHandle;
use crate::scheduler::Scheduler;

use log::warn;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque user data handed back to the callback on every firing.
pub type Payload = Rc<dyn Any>;

/// Identity of a registered callback.
///
/// Two callbacks are "the same" only if one is a clone of the other;
/// identical closure code registered twice yields two identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CallbackId(u64);

impl CallbackId {
    #[inline]
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl From<&TimerCallback> for CallbackId {
    #[inline]
    fn from(cb: &TimerCallback) -> Self {
        cb.id
    }
}

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// What a callback sees when its timer fires.
pub struct Fired<'a> {
    /// Handle of the firing timer. Valid for `remove_timer` / `pause` from inside the callback.
    pub handle: TimerHandle,
    pub payload: Option<&'a dyn Any>,
}

impl<'a> Fired<'a> {
    /// Typed view of the payload.
    #[inline]
    pub fn payload<T: Any>(&self) -> Option<&'a T> {
        self.payload.and_then(|p| p.downcast_ref::<T>())
    }
}

type CallbackFn = dyn FnMut(&mut Scheduler, &Fired<'_>);

/// Shared, identity-carrying timer callback.
///
/// The callback receives the scheduler itself, so it may create or remove timers
/// (including its own) while the update pass is running.
#[derive(Clone)]
pub struct TimerCallback {
    id: CallbackId,
    func: Rc<RefCell<CallbackFn>>,
}

impl TimerCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&mut Scheduler, &Fired<'_>) + 'static,
    {
        Self {
            id: CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed)),
            func: Rc::new(RefCell::new(f)),
        }
    }

    #[inline]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Returns `false` if the callback is already executing further up the stack.
    pub(crate) fn invoke(&self, scheduler: &mut Scheduler, fired: &Fired<'_>) -> bool {
        let Ok(mut f) = self.func.try_borrow_mut() else {
            warn!("timer callback {:?} is already executing; firing skipped", self.id);
            return false;
        };
        (&mut *f)(scheduler, fired);
        true
    }
}

impl PartialEq for TimerCallback {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TimerCallback {}

impl Hash for TimerCallback {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TimerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerCallback").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_fresh_callbacks_do_not() {
        let a = TimerCallback::new(|_, _| {});
        let b = a.clone();
        let c = TimerCallback::new(|_, _| {});

        assert_eq!(a, b);
        assert_eq!(a.id(), CallbackId::from(&b));
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn nested_invoke_of_the_same_callback_is_skipped() {
        let slot: Rc<RefCell<Option<TimerCallback>>> = Rc::new(RefCell::new(None));
        let nested = Rc::new(std::cell::Cell::new(None));

        let s = slot.clone();
        let n = nested.clone();
        let cb = TimerCallback::new(move |scheduler, fired| {
            let inner = s.borrow().clone();
            if let Some(inner) = inner {
                n.set(Some(inner.invoke(scheduler, fired)));
            }
        });
        *slot.borrow_mut() = Some(cb.clone());

        let mut scheduler = Scheduler::new();
        let fired = Fired {
            handle: TimerHandle::new(0, 0),
            payload: None,
        };

        assert!(cb.invoke(&mut scheduler, &fired));
        assert_eq!(nested.get(), Some(false));

        *slot.borrow_mut() = None;
    }

    #[test]
    fn typed_payload_view() {
        let payload: Payload = Rc::new(String::from("data"));
        let fired = Fired {
            handle: TimerHandle::new(0, 0),
            payload: Some(&*payload),
        };

        assert_eq!(fired.payload::<String>().map(String::as_str), Some("data"));
        assert!(fired.payload::<u32>().is_none());
    }
}
