//! Debounce and gesture state machine
//!
//! One machine serves the whole keypad and tracks at most one key. It is fed
//! two kinds of input:
//!
//! - column edges, reported as they happen (and as noisy as the contacts)
//! - expirations of its three scan timers
//!
//! ```text
//!  Released ──fall on c──> PressBouncing ──row found──> Pressed ──long press──> LongPressed
//!   ^  ^                        │          [Pressed]    │    ^   [LongPressed]      │
//!   │  └──────no row found──────┘                  rise on c │                 rise on c
//!   │                                                   v    │ c still Low          │
//!   └────────c High [Released]──────────────────── ReleaseBouncing <────────────────┘
//! ```
//!
//! Debouncing re-checks the physical lines once a quiet period has passed,
//! instead of counting edges, so any number of bounces in between is
//! harmless. The row sweep happens only when a press is confirmed; the
//! release check re-reads the latched column alone. That is sound only
//! because edges from every other column are dropped while a key is being
//! tracked, which is also what limits the keypad to one key at a time.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::KeypadConfig;
use crate::event::{ButtonEvent, GridPosition};
use crate::matrix::{Edge, Level, MatrixLines};
use crate::timer::{Timer, TimerService};

/// Gesture status of the whole keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// No key held
    Released,
    /// A column fell; waiting out the bounce before sweeping rows
    PressBouncing,
    /// A key is held and has been reported
    Pressed,
    /// A key has been held past the long-press threshold
    LongPressed,
    /// The held key's column rose; waiting out the bounce before trusting it
    ReleaseBouncing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    RowConfirm,
    ReleaseConfirm,
    LongPress,
}

/// Called from timer context with the kind and generation of the expiry
pub(crate) type FireFn = Arc<dyn Fn(TimerKind, u64) + Send + Sync>;

/// The machine's three timers, taken from a service up front
pub(crate) struct ScanTimers {
    row_confirm: Box<dyn Timer>,
    release_confirm: Box<dyn Timer>,
    long_press: Box<dyn Timer>,
}

impl ScanTimers {
    pub(crate) fn new(timers: &dyn TimerService) -> anyhow::Result<Self> {
        Ok(Self {
            row_confirm: timers.timer()?,
            release_confirm: timers.timer()?,
            long_press: timers.timer()?,
        })
    }
}

struct TimerSlot {
    kind: TimerKind,
    timer: Box<dyn Timer>,
    generation: u64,
    armed: bool,
}

impl TimerSlot {
    fn new(kind: TimerKind, timer: Box<dyn Timer>) -> Self {
        Self {
            kind,
            timer,
            generation: 0,
            armed: false,
        }
    }

    fn arm(&mut self, after: Duration, fire: &FireFn) {
        self.generation += 1;
        self.armed = true;

        let (kind, generation, fire) = (self.kind, self.generation, fire.clone());
        self.timer.arm(after, Box::new(move || fire(kind, generation)));
    }

    fn cancel(&mut self) {
        if self.armed {
            self.generation += 1;
            self.armed = false;
            self.timer.cancel();
        }
    }

    /// Accept an expiry only if it belongs to the latest arm
    fn claim(&mut self, generation: u64) -> bool {
        if self.armed && generation == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }
}

pub(crate) struct DebounceMachine {
    rows: u8,
    cols: u8,
    debounce: Duration,
    long_press: Duration,
    lines: Box<dyn MatrixLines>,
    state: MachineState,
    /// Column whose falling edge started the current gesture
    tracked_col: Option<u8>,
    /// Key latched by the last confirmed press
    pending: Option<GridPosition>,
    row_confirm: TimerSlot,
    release_confirm: TimerSlot,
    long_press_timer: TimerSlot,
    fire: FireFn,
}

impl DebounceMachine {
    pub(crate) fn new(
        config: &KeypadConfig,
        mut lines: Box<dyn MatrixLines>,
        timers: ScanTimers,
        fire: FireFn,
    ) -> Self {
        for row in 0..config.rows {
            lines.drive_row(row, Level::Low);
        }

        Self {
            rows: config.rows,
            cols: config.cols,
            debounce: config.debounce,
            long_press: config.long_press,
            lines,
            state: MachineState::Released,
            tracked_col: None,
            pending: None,
            row_confirm: TimerSlot::new(TimerKind::RowConfirm, timers.row_confirm),
            release_confirm: TimerSlot::new(TimerKind::ReleaseConfirm, timers.release_confirm),
            long_press_timer: TimerSlot::new(TimerKind::LongPress, timers.long_press),
            fire,
        }
    }

    pub(crate) fn state(&self) -> MachineState {
        self.state
    }

    pub(crate) fn pending(&self) -> Option<GridPosition> {
        self.pending
    }

    /// Handle an edge on a column line. Edges never produce events directly.
    pub(crate) fn on_edge(&mut self, col: u8, edge: Edge) {
        if col >= self.cols {
            warn!("edge on column {} outside {}-column grid", col, self.cols);
            return;
        }

        match (self.state, edge) {
            (MachineState::Released, Edge::Falling) => {
                self.tracked_col = Some(col);
                self.state = MachineState::PressBouncing;
                self.row_confirm.arm(self.debounce, &self.fire);
                debug!("column {} fell, confirming press", col);
            }
            (MachineState::Pressed | MachineState::LongPressed, Edge::Rising)
                if self.pending.map(|p| p.col) == Some(col) =>
            {
                self.state = MachineState::ReleaseBouncing;
                self.release_confirm.arm(self.debounce, &self.fire);
                debug!("column {} rose, confirming release", col);
            }
            (state, edge) => {
                trace!("{:?} on column {} ignored in {:?}", edge, col, state);
            }
        }
    }

    /// Handle a timer expiry, returning the event it confirmed, if any
    pub(crate) fn on_timer(&mut self, kind: TimerKind, generation: u64) -> Option<ButtonEvent> {
        let slot = match kind {
            TimerKind::RowConfirm => &mut self.row_confirm,
            TimerKind::ReleaseConfirm => &mut self.release_confirm,
            TimerKind::LongPress => &mut self.long_press_timer,
        };
        if !slot.claim(generation) {
            trace!("stale {:?} expiry ignored", kind);
            return None;
        }

        match kind {
            TimerKind::RowConfirm => self.confirm_press(),
            TimerKind::ReleaseConfirm => self.confirm_release(),
            TimerKind::LongPress => self.confirm_long_press(),
        }
    }

    fn confirm_press(&mut self) -> Option<ButtonEvent> {
        if self.state != MachineState::PressBouncing {
            return None;
        }
        let col = self.tracked_col?;

        let Some(row) = self.sweep_rows(col) else {
            // Column settled back up: it was noise
            self.state = MachineState::Released;
            self.tracked_col = None;
            debug!("no row active on column {}, press discarded", col);
            return None;
        };

        let position = GridPosition::new(row, col);
        self.state = MachineState::Pressed;
        self.pending = Some(position);
        self.long_press_timer.arm(self.long_press, &self.fire);
        debug!("press confirmed at {}", position);

        Some(ButtonEvent::Pressed(position))
    }

    fn confirm_release(&mut self) -> Option<ButtonEvent> {
        if self.state != MachineState::ReleaseBouncing {
            return None;
        }
        let position = self.pending?;

        if self.lines.read_column(position.col).is_low() {
            // Still held: the rise was a bounce
            self.state = MachineState::Pressed;
            debug!("{} still held, release discarded", position);
            return None;
        }

        self.state = MachineState::Released;
        self.long_press_timer.cancel();
        self.pending = None;
        self.tracked_col = None;
        debug!("release confirmed at {}", position);

        Some(ButtonEvent::Released(position))
    }

    fn confirm_long_press(&mut self) -> Option<ButtonEvent> {
        if self.state != MachineState::Pressed {
            return None;
        }
        let position = self.pending?;

        self.state = MachineState::LongPressed;
        debug!("long press at {}", position);

        Some(ButtonEvent::LongPressed(position))
    }

    /// Find the row joined to `col`.
    ///
    /// A column that reads High with every row parked is not held at all.
    /// Otherwise rows are raised one at a time and put back Low before the
    /// next is tried; the first one the column follows wins.
    fn sweep_rows(&mut self, col: u8) -> Option<u8> {
        if self.lines.read_column(col).is_high() {
            return None;
        }

        for row in 0..self.rows {
            self.lines.drive_row(row, Level::High);
            let level = self.lines.read_column(col);
            self.lines.drive_row(row, Level::Low);

            if level.is_high() {
                return Some(row);
            }
        }
        None
    }
}
