//! Simulated keypad wiring for unit tests

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::matrix::{Level, MatrixLines};

#[derive(Default)]
struct Wiring {
    /// Keys currently closed, as (row, col)
    closed: BTreeSet<(u8, u8)>,
    /// Rows currently driven High
    driven: BTreeSet<u8>,
    /// Every row drive, in order
    drives: Vec<(u8, Level)>,
}

/// Electrical model of a row/column matrix.
///
/// Columns float High unless a closed key connects them to a row; they then
/// follow that row. Cloning yields another handle on the same wiring, so a
/// test can keep one while the keypad owns the other.
#[derive(Clone, Default)]
pub(crate) struct FakeMatrix {
    wiring: Arc<Mutex<Wiring>>,
}

impl FakeMatrix {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn close(&self, row: u8, col: u8) {
        self.lock().closed.insert((row, col));
    }

    pub(crate) fn open(&self, row: u8, col: u8) {
        self.lock().closed.remove(&(row, col));
    }

    /// Rows left driven High after the last access
    pub(crate) fn rows_driven(&self) -> Vec<u8> {
        self.lock().driven.iter().copied().collect()
    }

    pub(crate) fn drives(&self) -> Vec<(u8, Level)> {
        self.lock().drives.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Wiring> {
        self.wiring.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl MatrixLines for FakeMatrix {
    fn drive_row(&mut self, row: u8, level: Level) {
        let mut wiring = self.lock();
        wiring.drives.push((row, level));
        match level {
            Level::High => wiring.driven.insert(row),
            Level::Low => wiring.driven.remove(&row),
        };
    }

    fn read_column(&mut self, col: u8) -> Level {
        let wiring = self.lock();
        let mut rows = wiring
            .closed
            .iter()
            .filter(|(_, c)| *c == col)
            .map(|(r, _)| *r)
            .peekable();

        if rows.peek().is_none() {
            // Pulled up
            return Level::High;
        }

        Level::from(rows.any(|r| wiring.driven.contains(&r)))
    }
}
