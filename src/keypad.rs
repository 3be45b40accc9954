//! Push-model keypad
//!
//! [`Keypad`] ties the state machine to its timers and to the dispatch
//! worker. Column edges and timer expiries both enter through one mutex, so
//! transitions are serialized exactly as they would be in interrupt context.
//! Confirmed events are posted while that mutex is still held, which keeps
//! dispatch order identical to classification order; posting only queues the
//! listener, so nothing under the lock waits on application code.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::info;

use crate::config::KeypadConfig;
use crate::dispatch::Dispatcher;
use crate::event::{EventKind, GridPosition};
use crate::machine::{DebounceMachine, FireFn, MachineState, ScanTimers, TimerKind};
use crate::matrix::{Edge, Level, MatrixLines};
use crate::timer::TimerService;

struct Shared {
    machine: Mutex<DebounceMachine>,
    dispatcher: Dispatcher,
}

impl Shared {
    fn machine(&self) -> MutexGuard<'_, DebounceMachine> {
        self.machine.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn on_timer(&self, kind: TimerKind, generation: u64) {
        let mut machine = self.machine();
        if let Some(event) = machine.on_timer(kind, generation) {
            self.dispatcher.post(event);
        }
    }
}

/// Handle on one keypad. Clones share the same keypad.
#[derive(Clone)]
pub struct Keypad {
    shared: Arc<Shared>,
}

impl Keypad {
    /// Build a keypad over `lines`, taking its three scan timers from
    /// `timers`. Rows are parked Low.
    ///
    /// Listeners can be registered right away but are only invoked once
    /// [`Keypad::initialize`] has started the dispatch worker.
    pub fn new(
        config: KeypadConfig,
        lines: impl MatrixLines + 'static,
        timers: &dyn TimerService,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let scan = ScanTimers::new(timers)?;

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            // Timer actions hold the keypad weakly so dropping the last
            // handle tears it down even with timers armed
            let weak = weak.clone();
            let fire: FireFn = Arc::new(move |kind: TimerKind, generation: u64| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer(kind, generation);
                }
            });

            Shared {
                machine: Mutex::new(DebounceMachine::new(&config, Box::new(lines), scan, fire)),
                dispatcher: Dispatcher::new(),
            }
        });

        info!(
            "keypad ready: {}x{} grid, {:?} debounce, {:?} long press",
            config.rows, config.cols, config.debounce, config.long_press
        );
        Ok(Self { shared })
    }

    /// Report an edge seen on a column line.
    ///
    /// This is the entry point for the platform's edge notifications. Edges
    /// may arrive from any thread and at any time; bounce is expected.
    pub fn column_edge(&self, col: u8, edge: Edge) {
        self.shared.machine().on_edge(col, edge);
    }

    /// Report that a column line changed, sampling its level with `read`.
    ///
    /// `read` runs under the keypad lock, after any row sweep in progress
    /// has parked the rows again, so the sweep's own pulses on the held
    /// column are never mistaken for a release.
    pub fn column_changed<F>(&self, col: u8, read: F)
    where
        F: FnOnce() -> Level,
    {
        let mut machine = self.shared.machine();
        machine.on_edge(col, Edge::toward(read()));
    }

    pub fn state(&self) -> MachineState {
        self.shared.machine().state()
    }

    /// Key latched by the last confirmed press, while it is held
    pub fn pending(&self) -> Option<GridPosition> {
        self.shared.machine().pending()
    }

    /// Start the dispatch worker. Fails if it is already running.
    pub fn initialize(&self) -> anyhow::Result<()> {
        self.shared.dispatcher.initialize()
    }

    /// Stop the dispatch worker after it has invoked every queued listener.
    /// Fails if it is not running, or when called from a listener.
    pub fn finalize(&self) -> anyhow::Result<()> {
        self.shared.dispatcher.finalize()
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.dispatcher.is_initialized()
    }

    /// Call `listener` with the key position of every later `kind` event.
    /// Replaces the listener previously registered for `kind`.
    pub fn register<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(GridPosition) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(kind, Arc::new(listener));
    }

    pub fn remove(&self, kind: EventKind) {
        self.shared.dispatcher.remove(kind);
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.shared.dispatcher.is_registered(kind)
    }
}
