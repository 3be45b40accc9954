//! ESP-IDF backend
//!
//! - [`EspColumns`]: column inputs with pull-ups and any-edge interrupts. The
//!   ISR only sets a notification bit; a monitor thread reads the settled
//!   level and feeds [`Keypad::column_changed`].
//! - [`EspRows`]: row outputs, plus raw column reads for the row sweep.
//! - [`EspTimers`]: one-shot timers on the `esp_timer` task service.
//!
//! The sweep itself toggles the held column, so the monitor sees extra
//! edges while a key is being confirmed. The level is sampled under the
//! keypad lock, after the sweep has parked the rows and the column is back
//! Low; the state machine ignores that falling edge.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context};
use esp_idf_hal::delay::BLOCK;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, InterruptType, Output, PinDriver, Pull};
use esp_idf_hal::task::notification::Notification;
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};
use heapless::Vec;
use log::{error, info, warn};

use crate::config::MAX_LINES;
use crate::keypad::Keypad;
use crate::matrix::{Level, MatrixLines};
use crate::timer::{Timer, TimerAction, TimerService};

/// Stack for the edge monitor thread
const MONITOR_STACK_SIZE: usize = 4096;

type ColumnPin = PinDriver<'static, AnyInputPin, Input>;

/// Column input lines, in column order
pub struct EspColumns {
    pins: Vec<ColumnPin, MAX_LINES>,
}

impl EspColumns {
    /// Configure `pins` as pulled-up inputs interrupting on both edges
    pub fn new(pins: impl IntoIterator<Item = AnyInputPin>) -> anyhow::Result<Self> {
        let mut drivers = Vec::new();
        for pin in pins {
            let mut driver = PinDriver::input(pin)?;
            driver.set_pull(Pull::Up)?;
            driver.set_interrupt_type(InterruptType::AnyEdge)?;
            drivers
                .push(driver)
                .map_err(|_| anyhow!("more than {} column pins", MAX_LINES))?;
        }
        Ok(Self { pins: drivers })
    }

    /// GPIO numbers, in column order
    pub fn numbers(&self) -> Vec<i32, MAX_LINES> {
        self.pins.iter().map(|pin| pin.pin()).collect()
    }

    /// Hand the columns to a thread that reports their edges to `keypad`
    pub fn monitor(self, keypad: Keypad) -> anyhow::Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("keypad-edges".into())
            .stack_size(MONITOR_STACK_SIZE)
            .spawn(move || {
                if let Err(e) = watch(self.pins, &keypad) {
                    error!("edge monitor stopped: {:#}", e);
                }
            })
            .context("spawning edge monitor")?;
        Ok(handle)
    }
}

fn watch(mut pins: Vec<ColumnPin, MAX_LINES>, keypad: &Keypad) -> anyhow::Result<()> {
    // Notifications target the task that created them
    let notification = Notification::new();

    for (col, pin) in pins.iter_mut().enumerate() {
        let notifier = notification.notifier();
        let bit = NonZeroU32::new(1 << col).context("column bit")?;
        // SAFETY: the callback only posts a task notification, which is ISR safe
        unsafe {
            pin.subscribe(move || {
                notifier.notify_and_yield(bit);
            })?;
        }
        pin.enable_interrupt()?;
    }
    info!("watching {} columns", pins.len());

    loop {
        let Some(bits) = notification.wait(BLOCK) else {
            continue;
        };

        for (col, pin) in pins.iter_mut().enumerate() {
            if bits.get() & (1 << col) == 0 {
                continue;
            }
            keypad.column_changed(col as u8, || Level::from(pin.is_high()));
            // Interrupts disarm themselves after each trigger
            pin.enable_interrupt()?;
        }
    }
}

/// Row output lines, with read access to the columns for the sweep
pub struct EspRows {
    rows: Vec<PinDriver<'static, AnyOutputPin, Output>, MAX_LINES>,
    columns: Vec<i32, MAX_LINES>,
}

impl EspRows {
    /// Configure `pins` as outputs parked Low. Columns are read through
    /// their GPIO numbers since [`EspColumns`] owns their drivers.
    pub fn new(
        pins: impl IntoIterator<Item = AnyOutputPin>,
        columns: &EspColumns,
    ) -> anyhow::Result<Self> {
        let mut rows = Vec::new();
        for pin in pins {
            let mut driver = PinDriver::output(pin)?;
            driver.set_low()?;
            rows.push(driver)
                .map_err(|_| anyhow!("more than {} row pins", MAX_LINES))?;
        }
        Ok(Self {
            rows,
            columns: columns.numbers(),
        })
    }
}

impl MatrixLines for EspRows {
    fn drive_row(&mut self, row: u8, level: Level) {
        let Some(pin) = self.rows.get_mut(usize::from(row)) else {
            warn!("no row {}", row);
            return;
        };
        let result = match level {
            Level::High => pin.set_high(),
            Level::Low => pin.set_low(),
        };
        if let Err(e) = result {
            warn!("driving row {} {:?}: {}", row, level, e);
        }
    }

    fn read_column(&mut self, col: u8) -> Level {
        let Some(&gpio) = self.columns.get(usize::from(col)) else {
            warn!("no column {}", col);
            return Level::High;
        };
        // SAFETY: reading the input register of a configured input pin
        Level::from(unsafe { esp_idf_sys::gpio_get_level(gpio) } != 0)
    }
}

/// Timers on the shared `esp_timer` task
#[derive(Clone)]
pub struct EspTimers {
    service: EspTaskTimerService,
}

impl EspTimers {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            service: EspTaskTimerService::new()?,
        })
    }
}

impl TimerService for EspTimers {
    fn timer(&self) -> anyhow::Result<Box<dyn Timer>> {
        let slot: Arc<Mutex<Option<TimerAction>>> = Arc::new(Mutex::new(None));
        let pending = slot.clone();
        let timer = self.service.timer(move || {
            let action = lock(&pending).take();
            if let Some(action) = action {
                action();
            }
        })?;
        Ok(Box::new(EspScanTimer { timer, slot }))
    }
}

struct EspScanTimer {
    timer: EspTimer<'static>,
    slot: Arc<Mutex<Option<TimerAction>>>,
}

impl Timer for EspScanTimer {
    fn arm(&mut self, after: Duration, action: TimerAction) {
        self.cancel();
        *lock(&self.slot) = Some(action);
        if let Err(e) = self.timer.after(after) {
            warn!("arming timer: {}", e);
            lock(&self.slot).take();
        }
    }

    fn cancel(&mut self) {
        if let Err(e) = self.timer.cancel() {
            warn!("cancelling timer: {}", e);
        }
        lock(&self.slot).take();
    }
}

fn lock(slot: &Mutex<Option<TimerAction>>) -> MutexGuard<'_, Option<TimerAction>> {
    slot.lock().unwrap_or_else(|p| p.into_inner())
}
