#![forbid(unsafe_op_in_unsafe_fn)]

//! NewEngine timer system.
//!
//! A single [`Scheduler`] is owned by the host and ticked once per frame.
//! Timers are recycled through a [`Pool`] and addressed by generational
//! [`TimerHandle`]s, so a handle that outlived its timer is simply ignored.
//!
//! ```ignore
//! use newengine_timers::{Scheduler, TimerCallback, TimerExt};
//!
//! let mut timers = Scheduler::new();
//! let beep = TimerCallback::new(|_, _| log::info!("beep"));
//! timers.add_repeat(0.5, &beep, None, false)?;
//!
//! // host frame loop
//! timers.tick(frame_dt);
//! ```

pub mod callback;
pub mod config;
pub mod entity;
pub mod error;
pub mod extensions;
pub mod handle;
pub mod pool;
pub mod scheduler;

pub use callback::{CallbackId, Fired, Payload, TimerCallback};
pub use config::SchedulerConfig;
pub use entity::{TimerEntity, REPEAT_FOREVER};
pub use error::{TimerError, TimerResult};
pub use extensions::TimerExt;
pub use handle::TimerHandle;
pub use pool::Pool;
pub use scheduler::Scheduler;
