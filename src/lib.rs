//! keypad-events - Debounced gestures from a matrix keypad
//!
//! Raw column edges from a row/column keypad are noisy. This crate turns them
//! into clean `Pressed`, `Released` and `LongPressed` events:
//! 1. A falling column edge starts a debounce wait
//! 2. After the quiet period the rows are swept to find the held key
//! 3. Holding past the long-press threshold reports a long press
//! 4. A rising edge on the held column, stable for the debounce period,
//!    reports the release
//!
//! Events reach the application either through listeners run in order on a
//! dispatch thread ([`Keypad`]) or through per-kind ring buffers polled at
//! the application's own pace ([`BufferedKeypad`]).
//!
//! Hardware access goes through [`MatrixLines`] and [`timer::TimerService`].
//! With the `esp` feature the [`esp`] module provides both for ESP-IDF.

pub mod buffer;
pub mod buffered;
pub mod config;
mod dispatch;
pub mod event;
pub mod keypad;
pub mod machine;
pub mod matrix;
pub mod timer;

#[cfg(feature = "esp")]
pub mod esp;

#[cfg(test)]
mod testing;

pub use buffered::BufferedKeypad;
pub use config::KeypadConfig;
pub use event::{ButtonEvent, EventKind, GridPosition};
pub use keypad::Keypad;
pub use machine::MachineState;
pub use matrix::{Edge, Level, MatrixLines};
