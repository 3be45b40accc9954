//! Button events and grid positions
//!
//! Every confirmed gesture becomes exactly one [`ButtonEvent`] carrying the
//! [`GridPosition`] of the key that produced it. Events are plain values:
//! they are built once by the state machine and never mutated afterwards.
//!
//! For output over a serial line an event can be packed into a compact
//! postcard frame.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Row/column coordinate of a physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u8,
    pub col: u8,
}

impl GridPosition {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The three gesture kinds, without a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Pressed,
    Released,
    LongPressed,
}

impl EventKind {
    /// All kinds, in the order they are indexed internally
    pub const ALL: [EventKind; 3] = [
        EventKind::Pressed,
        EventKind::Released,
        EventKind::LongPressed,
    ];

    pub(crate) const fn index(self) -> usize {
        match self {
            EventKind::Pressed => 0,
            EventKind::Released => 1,
            EventKind::LongPressed => 2,
        }
    }
}

/// A confirmed gesture on one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEvent {
    /// Key went down and stayed down for the debounce period
    Pressed(GridPosition),
    /// Key came back up and stayed up for the debounce period
    Released(GridPosition),
    /// Key has been held past the long-press threshold
    LongPressed(GridPosition),
}

impl ButtonEvent {
    pub const fn new(kind: EventKind, position: GridPosition) -> Self {
        match kind {
            EventKind::Pressed => ButtonEvent::Pressed(position),
            EventKind::Released => ButtonEvent::Released(position),
            EventKind::LongPressed => ButtonEvent::LongPressed(position),
        }
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            ButtonEvent::Pressed(_) => EventKind::Pressed,
            ButtonEvent::Released(_) => EventKind::Released,
            ButtonEvent::LongPressed(_) => EventKind::LongPressed,
        }
    }

    pub const fn position(&self) -> GridPosition {
        match self {
            ButtonEvent::Pressed(p) | ButtonEvent::Released(p) | ButtonEvent::LongPressed(p) => *p,
        }
    }

    /// Serialize into a postcard frame (deterministic encoding)
    pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decode a frame produced by [`ButtonEvent::to_frame`]
    pub fn from_frame(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }

    /// Frame as lowercase hex, for line-oriented serial output
    pub fn frame_hex(&self) -> anyhow::Result<String> {
        Ok(hex_encode(&self.to_frame()?))
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.kind(), self.position())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_position_survive_construction() {
        let pos = GridPosition::new(2, 3);
        for kind in EventKind::ALL {
            let event = ButtonEvent::new(kind, pos);
            assert_eq!(event.kind(), kind);
            assert_eq!(event.position(), pos);
        }
    }

    #[test]
    fn test_frame_decodes_to_same_event() {
        let event = ButtonEvent::LongPressed(GridPosition::new(1, 3));
        let frame = event.to_frame().unwrap();
        // Variant tag plus two single-byte varints
        assert_eq!(frame, vec![2, 1, 3]);
        assert_eq!(ButtonEvent::from_frame(&frame).unwrap(), event);
        assert_eq!(event.frame_hex().unwrap(), "020103");
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        assert!(ButtonEvent::from_frame(&[0, 1]).is_err());
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(hex_encode(&[0x00, 0xff]), "00ff");
    }

    #[test]
    fn test_display() {
        let event = ButtonEvent::Pressed(GridPosition::new(0, 2));
        assert_eq!(event.to_string(), "Pressed at (0, 2)");
    }
}
