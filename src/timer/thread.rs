//! Timers on a scheduler thread
//!
//! One background thread sleeps until the earliest deadline, takes that
//! action out of the table and runs it with the table unlocked. Keypads only
//! ever hold a handful of timers, so the earliest deadline is found with a
//! linear scan.
//!
//! The thread lives as long as the service or any timer taken from it, so a
//! keypad keeps its timers running after the service value itself is gone.
//! Once the last of them is dropped the thread stops; actions still pending
//! at that point never run.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, error};

use super::{Timer, TimerAction, TimerService};

struct Pending {
    deadline: Instant,
    action: TimerAction,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    pending: HashMap<u64, Pending>,
    shutdown: bool,
}

#[derive(Default)]
struct Scheduler {
    table: Mutex<Table>,
    wake: Condvar,
}

impl Scheduler {
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn run(&self) {
        let mut table = self.lock();

        loop {
            if table.shutdown {
                return;
            }

            let next = table
                .pending
                .iter()
                .min_by_key(|(_, p)| p.deadline)
                .map(|(id, p)| (*id, p.deadline));

            let Some((id, deadline)) = next else {
                table = self.wake.wait(table).unwrap_or_else(|p| p.into_inner());
                continue;
            };

            let now = Instant::now();
            if deadline > now {
                table = self
                    .wake
                    .wait_timeout(table, deadline - now)
                    .unwrap_or_else(|p| p.into_inner())
                    .0;
                continue;
            }

            let Some(pending) = table.pending.remove(&id) else {
                continue;
            };

            drop(table);
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(pending.action));
            if outcome.is_err() {
                error!("timer action panicked");
            }
            table = self.lock();
        }
    }
}

/// Owns the scheduler thread. Shared by the service and its timers.
struct Runner {
    scheduler: Arc<Scheduler>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.scheduler.lock().shutdown = true;
        self.scheduler.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            // An action may drop the last handle from the scheduler thread itself
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                error!("timer thread panicked");
            }
        }
        debug!("timer thread stopped");
    }
}

#[derive(Clone)]
pub struct ThreadTimers {
    runner: Arc<Runner>,
}

impl ThreadTimers {
    /// Start the scheduler thread
    pub fn new() -> anyhow::Result<Self> {
        let scheduler = Arc::new(Scheduler::default());
        let thread_scheduler = scheduler.clone();

        let worker = thread::Builder::new()
            .name("keypad-timers".into())
            .spawn(move || thread_scheduler.run())
            .context("spawning timer thread")?;

        debug!("timer thread started");

        Ok(Self {
            runner: Arc::new(Runner {
                scheduler,
                worker: Some(worker),
            }),
        })
    }
}

impl TimerService for ThreadTimers {
    fn timer(&self) -> anyhow::Result<Box<dyn Timer>> {
        let id = {
            let mut table = self.runner.scheduler.lock();
            table.next_id += 1;
            table.next_id
        };

        Ok(Box::new(ThreadTimer {
            id,
            runner: self.runner.clone(),
        }))
    }
}

struct ThreadTimer {
    id: u64,
    runner: Arc<Runner>,
}

impl ThreadTimer {
    fn scheduler(&self) -> &Scheduler {
        &self.runner.scheduler
    }
}

impl Timer for ThreadTimer {
    fn arm(&mut self, after: Duration, action: TimerAction) {
        let replaced = self.scheduler().lock().pending.insert(
            self.id,
            Pending {
                deadline: Instant::now() + after,
                action,
            },
        );
        self.scheduler().wake.notify_all();
        drop(replaced);
    }

    fn cancel(&mut self) {
        let removed = self.scheduler().lock().pending.remove(&self.id);
        if removed.is_some() {
            self.scheduler().wake.notify_all();
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
