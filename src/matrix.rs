//! Row/column line access
//!
//! The keypad is wired as a matrix: each key joins one row line to one
//! column line. Columns idle High through pull-ups and rows idle Low, so a
//! held key drags its column Low and the column sees a falling edge. To find
//! which row the key sits on, rows are driven High one at a time while the
//! column is read: it only follows the row that the held key connects it to.
//!
//! Pin enumeration and driving are platform concerns; the state machine only
//! sees the [`MatrixLines`] trait.

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Direction of a column transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// High to Low: a key on the column closed (or bounced closed)
    Falling,
    /// Low to High: a key on the column opened (or bounced open)
    Rising,
}

impl Edge {
    /// The edge that leaves a line at `level`
    pub fn toward(level: Level) -> Self {
        match level {
            Level::Low => Edge::Falling,
            Level::High => Edge::Rising,
        }
    }
}

/// Row outputs and column inputs of one keypad
pub trait MatrixLines: Send {
    /// Drive a row line. Rows rest at [`Level::Low`].
    fn drive_row(&mut self, row: u8, level: Level);

    /// Sample a column line
    fn read_column(&mut self, col: u8) -> Level;
}
