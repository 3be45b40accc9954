//! Timers on a hand-cranked clock
//!
//! Nothing fires until [`ManualTimers::advance`] moves the clock. Expired
//! actions run on the caller's thread, in deadline order, with no internal
//! lock held, so an action may arm or cancel timers of the same service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Timer, TimerAction, TimerService};

struct Pending {
    deadline: Duration,
    /// Arm order, breaks ties between equal deadlines
    seq: u64,
    action: TimerAction,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    pending: HashMap<u64, Pending>,
}

#[derive(Clone, Default)]
pub struct ManualTimers {
    clock: Arc<Mutex<Clock>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the service was created
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward, firing every action that falls due on the way
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;

        loop {
            let action = {
                let mut clock = self.lock();
                let due = clock
                    .pending
                    .iter()
                    .filter(|(_, p)| p.deadline <= target)
                    .min_by_key(|(_, p)| (p.deadline, p.seq))
                    .map(|(id, _)| *id);

                match due.and_then(|id| clock.pending.remove(&id)) {
                    Some(pending) => {
                        clock.now = clock.now.max(pending.deadline);
                        pending.action
                    }
                    None => {
                        clock.now = target;
                        return;
                    }
                }
            };

            action();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl TimerService for ManualTimers {
    fn timer(&self) -> anyhow::Result<Box<dyn Timer>> {
        let id = {
            let mut clock = self.lock();
            clock.next_id += 1;
            clock.next_id
        };

        Ok(Box::new(ManualTimer {
            id,
            timers: self.clone(),
        }))
    }
}

struct ManualTimer {
    id: u64,
    timers: ManualTimers,
}

impl Timer for ManualTimer {
    fn arm(&mut self, after: Duration, action: TimerAction) {
        let mut clock = self.timers.lock();
        let deadline = clock.now + after;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let replaced = clock.pending.insert(
            self.id,
            Pending {
                deadline,
                seq,
                action,
            },
        );
        // Release the clock before the replaced action is dropped
        drop(clock);
        drop(replaced);
    }

    fn cancel(&mut self) {
        let removed = self.timers.lock().pending.remove(&self.id);
        drop(removed);
    }
}

impl Drop for ManualTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerAction) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| -> TimerAction {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let timers = ManualTimers::new();
        let (log, action) = recorder();
        let mut slow = timers.timer().unwrap();
        let mut fast = timers.timer().unwrap();

        slow.arm(Duration::from_millis(30), action("slow"));
        fast.arm(Duration::from_millis(10), action("fast"));

        timers.advance(Duration::from_millis(9));
        assert!(log.lock().unwrap().is_empty());

        timers.advance(Duration::from_millis(25));
        assert_eq!(*log.lock().unwrap(), vec!["fast", "slow"]);
        assert_eq!(timers.now(), Duration::from_millis(34));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_rearm_replaces_and_cancel_drops() {
        let timers = ManualTimers::new();
        let (log, action) = recorder();
        let mut timer = timers.timer().unwrap();

        timer.arm(Duration::from_millis(10), action("first"));
        timer.arm(Duration::from_millis(20), action("second"));
        timers.advance(Duration::from_millis(15));
        assert!(log.lock().unwrap().is_empty());

        timers.advance(Duration::from_millis(5));
        assert_eq!(*log.lock().unwrap(), vec!["second"]);

        timer.arm(Duration::from_millis(10), action("cancelled"));
        timer.cancel();
        timers.advance(Duration::from_millis(50));
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_action_can_arm_within_same_advance() {
        let timers = ManualTimers::new();
        let (log, action) = recorder();
        let mut first = timers.timer().unwrap();
        let second = Arc::new(Mutex::new(timers.timer().unwrap()));

        let follow_up = action("follow-up");
        let chained = second.clone();
        first.arm(
            Duration::from_millis(10),
            Box::new(move || {
                chained
                    .lock()
                    .unwrap()
                    .arm(Duration::from_millis(10), follow_up);
            }),
        );

        timers.advance(Duration::from_millis(25));
        assert_eq!(*log.lock().unwrap(), vec!["follow-up"]);
    }
}
