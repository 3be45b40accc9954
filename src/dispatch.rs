//! Ordered listener dispatch
//!
//! Confirmed events are posted onto an unbounded `mpsc` channel and a single
//! worker thread invokes the matching listener for each, strictly in posting
//! order and one at a time. A slow listener therefore delays everything
//! posted after it, of every kind. Posting never waits for a listener, so
//! gesture classification is never held up by application code.
//!
//! Listeners are looked up when an event is posted: registering or removing a
//! listener affects events classified afterwards, not ones already queued.
//! Registrations survive stopping and restarting the worker.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context};
use log::{debug, error, info, warn};

use crate::event::{ButtonEvent, EventKind, GridPosition};

/// Callback receiving the position of the key an event happened on
pub type Listener = Arc<dyn Fn(GridPosition) + Send + Sync + 'static>;

enum Job {
    Invoke(Listener, GridPosition),
    /// Queued behind everything posted before `finalize`
    Stop,
}

struct Worker {
    tx: Sender<Job>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct Dispatcher {
    listeners: Mutex<[Option<Listener>; 3]>,
    worker: Mutex<Option<Worker>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Install the listener for `kind`, replacing any previous one
    pub(crate) fn register(&self, kind: EventKind, listener: Listener) {
        self.listeners()[kind.index()] = Some(listener);
    }

    pub(crate) fn remove(&self, kind: EventKind) {
        self.listeners()[kind.index()] = None;
    }

    pub(crate) fn is_registered(&self, kind: EventKind) -> bool {
        self.listeners()[kind.index()].is_some()
    }

    /// Queue the current listener for this event's kind
    pub(crate) fn post(&self, event: ButtonEvent) {
        let Some(listener) = self.listeners()[event.kind().index()].clone() else {
            return;
        };

        match self.worker().as_ref() {
            Some(worker) => {
                if worker.tx.send(Job::Invoke(listener, event.position())).is_err() {
                    warn!("dispatch worker gone, {} dropped", event);
                }
            }
            None => debug!("dispatch not running, {} dropped", event),
        }
    }

    /// Start the worker thread
    pub(crate) fn initialize(&self) -> anyhow::Result<()> {
        let mut worker = self.worker();
        if worker.is_some() {
            bail!("dispatch worker already running");
        }

        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("keypad-dispatch".into())
            .spawn(move || drain(rx))
            .context("spawning dispatch worker")?;

        *worker = Some(Worker { tx, handle });
        info!("dispatch worker started");
        Ok(())
    }

    /// Let the worker finish everything already queued, then join it
    pub(crate) fn finalize(&self) -> anyhow::Result<()> {
        let worker = {
            let mut slot = self.worker();
            if let Some(w) = slot.as_ref() {
                if w.handle.thread().id() == thread::current().id() {
                    bail!("dispatch worker cannot be finalized from a listener");
                }
            }
            slot.take().context("dispatch worker not running")?
        };

        // Nothing can be posted behind the stop marker: the slot is empty
        let _ = worker.tx.send(Job::Stop);
        worker
            .handle
            .join()
            .map_err(|_| anyhow!("dispatch worker panicked"))?;

        info!("dispatch worker stopped");
        Ok(())
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.worker().is_some()
    }

    fn listeners(&self) -> MutexGuard<'_, [Option<Listener>; 3]> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let Some(worker) = self.worker().take() else {
            return;
        };

        let _ = worker.tx.send(Job::Stop);
        // The last handle may be released by a listener, on the worker itself
        if worker.handle.thread().id() != thread::current().id() && worker.handle.join().is_err()
        {
            error!("dispatch worker panicked");
        }
    }
}

fn drain(rx: Receiver<Job>) {
    for job in rx {
        match job {
            Job::Invoke(listener, position) => {
                if catch_unwind(AssertUnwindSafe(|| listener(position))).is_err() {
                    error!("listener panicked on {}", position);
                }
            }
            Job::Stop => break,
        }
    }
}
