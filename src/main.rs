//! keypad-events firmware - 4x4 matrix keypad event reporter
//!
//! Watches a 4x4 keypad and, for every debounced gesture:
//! 1. Logs the event and the key position
//! 2. Prints one machine-readable line carrying the encoded event frame
//!
//! Rows are driven on GPIO4-7, columns are read on GPIO15-18 with the
//! internal pull-ups.

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use log::{info, warn};

use keypad_events::esp::{EspColumns, EspRows, EspTimers};
use keypad_events::{BufferedKeypad, ButtonEvent, EventKind, KeypadConfig};

/// Poll interval for the event buffers
const POLL_MS: u32 = 10;

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_sys::link_patches();
    EspLogger::initialize_default();

    info!("keypad-events v{} starting", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let columns = EspColumns::new([
        pins.gpio15.downgrade_input(),
        pins.gpio16.downgrade_input(),
        pins.gpio17.downgrade_input(),
        pins.gpio18.downgrade_input(),
    ])?;
    let rows = EspRows::new(
        [
            pins.gpio4.downgrade_output(),
            pins.gpio5.downgrade_output(),
            pins.gpio6.downgrade_output(),
            pins.gpio7.downgrade_output(),
        ],
        &columns,
    )?;
    info!("Rows on GPIO4-7, columns on GPIO{:?}", columns.numbers());

    let timers = EspTimers::new()?;
    let keypad = BufferedKeypad::new(KeypadConfig::default(), rows, &timers)?;
    keypad.initialize()?;
    let _monitor = columns.monitor(keypad.keypad().clone())?;

    info!("Entering event loop - press a key");

    loop {
        for kind in EventKind::ALL {
            while let Some(position) = keypad.peek(kind) {
                output_event(ButtonEvent::new(kind, position));
                keypad.pop(kind);
            }
        }

        // Small delay to prevent busy-spinning
        FreeRtos::delay_ms(POLL_MS);
    }
}

/// Output one event (currently via serial/log)
fn output_event(event: ButtonEvent) {
    info!("{}", event);

    let frame = match event.frame_hex() {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Encoding {} failed: {}", event, e);
            return;
        }
    };

    // Machine-readable output (JSON-ish for easy parsing)
    let position = event.position();
    println!(
        "{{\"event\":\"{:?}\",\"ts\":{},\"row\":{},\"col\":{},\"frame\":\"{}\"}}",
        event.kind(),
        uptime_ms(),
        position.row,
        position.col,
        frame
    );
}

/// Milliseconds since boot
fn uptime_ms() -> u64 {
    // SAFETY: esp_timer is started by the IDF before main and the call has no preconditions
    unsafe { esp_idf_sys::esp_timer_get_time() as u64 / 1000 }
}
