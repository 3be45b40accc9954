//! Keypad tunables
//!
//! Grid size, debounce period, long-press threshold and per-kind buffer size
//! are carried in a [`KeypadConfig`] handed to the keypad at construction, so
//! several keypads with different timings can live in one program.

use std::time::Duration;

use anyhow::ensure;

use crate::event::GridPosition;

/// Rows on the stock 4x4 membrane keypad
pub const DEFAULT_ROWS: u8 = 4;
/// Columns on the stock 4x4 membrane keypad
pub const DEFAULT_COLS: u8 = 4;
/// Quiet period before a line's level is trusted
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(60);
/// Hold time after a confirmed press before a long press is reported
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(300);
/// Events kept per kind before the oldest is overwritten
pub const DEFAULT_BUFFER_CAPACITY: usize = 16;

/// Upper bound on rows and on columns.
///
/// Column edges are reported to the edge monitor as bits of a 32-bit
/// notification value.
pub const MAX_LINES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadConfig {
    pub rows: u8,
    pub cols: u8,
    pub debounce: Duration,
    pub long_press: Duration,
    pub buffer_capacity: usize,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            debounce: DEFAULT_DEBOUNCE,
            long_press: DEFAULT_LONG_PRESS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl KeypadConfig {
    pub fn with_grid(mut self, rows: u8, cols: u8) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_long_press(mut self, long_press: Duration) -> Self {
        self.long_press = long_press;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Reject configurations the state machine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.rows > 0 && usize::from(self.rows) <= MAX_LINES,
            "row count {} outside 1..={}",
            self.rows,
            MAX_LINES
        );
        ensure!(
            self.cols > 0 && usize::from(self.cols) <= MAX_LINES,
            "column count {} outside 1..={}",
            self.cols,
            MAX_LINES
        );
        ensure!(!self.debounce.is_zero(), "debounce period must be non-zero");
        ensure!(
            !self.long_press.is_zero(),
            "long-press threshold must be non-zero"
        );
        ensure!(self.buffer_capacity > 0, "buffer capacity must be non-zero");
        Ok(())
    }

    /// Whether a position lies on this grid
    pub fn contains(&self, position: GridPosition) -> bool {
        position.row < self.rows && position.col < self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_keypad() {
        let config = KeypadConfig::default();
        assert_eq!((config.rows, config.cols), (4, 4));
        assert_eq!(config.debounce, Duration::from_millis(60));
        assert_eq!(config.long_press, Duration::from_millis(300));
        assert_eq!(config.buffer_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_configs() {
        let base = KeypadConfig::default();
        assert!(base.clone().with_grid(0, 4).validate().is_err());
        assert!(base.clone().with_grid(4, 33).validate().is_err());
        assert!(base.clone().with_debounce(Duration::ZERO).validate().is_err());
        assert!(base.clone().with_long_press(Duration::ZERO).validate().is_err());
        assert!(base.clone().with_buffer_capacity(0).validate().is_err());
        assert!(base.with_grid(32, 1).validate().is_ok());
    }

    #[test]
    fn test_contains() {
        let config = KeypadConfig::default().with_grid(2, 3);
        assert!(config.contains(GridPosition::new(1, 2)));
        assert!(!config.contains(GridPosition::new(2, 0)));
        assert!(!config.contains(GridPosition::new(0, 3)));
    }
}
