//! One-shot scan timers
//!
//! The state machine needs three re-armable one-shot timers (row confirm,
//! release confirm, long press). It only depends on [`Timer`] and
//! [`TimerService`]; which clock drives them is chosen by whoever builds the
//! keypad:
//!
//! - [`ThreadTimers`]: a scheduler thread, for hosts with `std`
//! - [`ManualTimers`]: an explicit clock advanced by the caller, for tests
//! - `EspTimers` (feature `esp`): the ESP-IDF `esp_timer` task service
//!
//! Arming a timer that is already armed replaces both its deadline and its
//! action. Cancelling stops a pending action from being started; an action
//! that already started is not interrupted, which is why the state machine
//! tags every arm with a generation number and ignores stale expirations.

use std::time::Duration;

pub mod manual;
pub mod thread;

pub use manual::ManualTimers;
pub use thread::ThreadTimers;

/// Work run once when a timer expires
pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

pub trait Timer: Send {
    /// Run `action` once, `after` from now, replacing anything pending
    fn arm(&mut self, after: Duration, action: TimerAction);

    /// Drop the pending action, if any
    fn cancel(&mut self);
}

/// Source of timers sharing one clock
pub trait TimerService {
    fn timer(&self) -> anyhow::Result<Box<dyn Timer>>;
}
