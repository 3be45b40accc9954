//! Poll-model keypad
//!
//! [`BufferedKeypad`] is a consumer of the push model: it registers one
//! listener per event kind that appends the key position to that kind's
//! [`EventBuffer`]. The application then polls at its own pace with
//! `available` / `peek` / `pop`, none of which block.

use std::sync::Arc;

use crate::buffer::EventBuffer;
use crate::config::KeypadConfig;
use crate::event::{EventKind, GridPosition};
use crate::keypad::Keypad;
use crate::matrix::MatrixLines;
use crate::timer::TimerService;

pub struct BufferedKeypad {
    keypad: Keypad,
    buffers: [Arc<EventBuffer>; 3],
}

impl BufferedKeypad {
    pub fn new(
        config: KeypadConfig,
        lines: impl MatrixLines + 'static,
        timers: &dyn TimerService,
    ) -> anyhow::Result<Self> {
        let capacity = config.buffer_capacity;
        let keypad = Keypad::new(config, lines, timers)?;
        let buffers = EventKind::ALL.map(|_| Arc::new(EventBuffer::new(capacity)));

        for kind in EventKind::ALL {
            let buffer = buffers[kind.index()].clone();
            keypad.register(kind, move |position| {
                buffer.push(position);
            });
        }

        Ok(Self { keypad, buffers })
    }

    /// Start filling the buffers. Fails if already started.
    pub fn initialize(&self) -> anyhow::Result<()> {
        self.keypad.initialize()
    }

    /// Stop filling the buffers once queued events are stored. Buffered
    /// entries stay readable.
    pub fn finalize(&self) -> anyhow::Result<()> {
        self.keypad.finalize()
    }

    pub fn is_initialized(&self) -> bool {
        self.keypad.is_initialized()
    }

    /// Unconsumed `kind` events
    pub fn available(&self, kind: EventKind) -> usize {
        self.buffer(kind).available()
    }

    /// Oldest unconsumed `kind` event, left in place
    pub fn peek(&self, kind: EventKind) -> Option<GridPosition> {
        self.buffer(kind).peek()
    }

    /// Consume the oldest `kind` event. Returns `false` if there was none.
    pub fn pop(&self, kind: EventKind) -> bool {
        self.buffer(kind).pop()
    }

    /// Entries kept per kind before the oldest is overwritten
    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity()
    }

    /// The underlying keypad, for feeding edges and inspecting state
    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    fn buffer(&self, kind: EventKind) -> &EventBuffer {
        &self.buffers[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::matrix::Edge;
    use crate::testing::FakeMatrix;
    use crate::timer::ManualTimers;

    fn setup(capacity: usize) -> (BufferedKeypad, ManualTimers, FakeMatrix) {
        let timers = ManualTimers::new();
        let matrix = FakeMatrix::new();
        let config = KeypadConfig::default().with_buffer_capacity(capacity);
        let keypad = BufferedKeypad::new(config, matrix.clone(), &timers).unwrap();
        keypad.initialize().unwrap();
        (keypad, timers, matrix)
    }

    fn tap(keypad: &BufferedKeypad, timers: &ManualTimers, matrix: &FakeMatrix, row: u8, col: u8) {
        matrix.close(row, col);
        keypad.keypad().column_edge(col, Edge::Falling);
        timers.advance(Duration::from_millis(80));
        matrix.open(row, col);
        keypad.keypad().column_edge(col, Edge::Rising);
        timers.advance(Duration::from_millis(80));
    }

    /// Wait for the dispatch worker to store everything classified so far
    fn flush(keypad: &BufferedKeypad) {
        keypad.finalize().unwrap();
        keypad.initialize().unwrap();
    }

    #[test]
    fn test_taps_are_buffered_per_kind() {
        let (keypad, timers, matrix) = setup(16);
        tap(&keypad, &timers, &matrix, 0, 1);
        tap(&keypad, &timers, &matrix, 3, 2);
        flush(&keypad);

        assert_eq!(keypad.available(EventKind::Pressed), 2);
        assert_eq!(keypad.available(EventKind::Released), 2);
        assert_eq!(keypad.available(EventKind::LongPressed), 0);

        assert_eq!(keypad.peek(EventKind::Pressed), Some(GridPosition::new(0, 1)));
        assert!(keypad.pop(EventKind::Pressed));
        assert_eq!(keypad.peek(EventKind::Pressed), Some(GridPosition::new(3, 2)));
        assert!(keypad.pop(EventKind::Pressed));
        assert_eq!(keypad.peek(EventKind::Pressed), None);
        assert!(!keypad.pop(EventKind::Pressed));

        assert_eq!(keypad.available(EventKind::Released), 2);
    }

    #[test]
    fn test_long_press_buffered() {
        let (keypad, timers, matrix) = setup(16);
        matrix.close(2, 0);
        keypad.keypad().column_edge(0, Edge::Falling);
        timers.advance(Duration::from_millis(500));
        flush(&keypad);

        assert_eq!(keypad.peek(EventKind::LongPressed), Some(GridPosition::new(2, 0)));
        assert_eq!(keypad.available(EventKind::Released), 0);
    }

    #[test]
    fn test_overflow_keeps_newest() {
        let (keypad, timers, matrix) = setup(2);
        assert_eq!(keypad.capacity(), 2);
        for col in 0..3 {
            tap(&keypad, &timers, &matrix, 1, col);
        }
        flush(&keypad);

        assert_eq!(keypad.available(EventKind::Pressed), 2);
        assert_eq!(keypad.peek(EventKind::Pressed), Some(GridPosition::new(1, 1)));
        assert!(keypad.pop(EventKind::Pressed));
        assert_eq!(keypad.peek(EventKind::Pressed), Some(GridPosition::new(1, 2)));
    }

    #[test]
    fn test_buffers_readable_after_finalize() {
        let (keypad, timers, matrix) = setup(16);
        tap(&keypad, &timers, &matrix, 0, 0);
        keypad.finalize().unwrap();

        assert!(!keypad.is_initialized());
        assert_eq!(keypad.available(EventKind::Pressed), 1);
        assert!(keypad.finalize().is_err());
    }
}
