//! SysTick based embassy time driver with a single alarm

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver};

#[derive(Copy, Clone)]
struct AlarmCallback {
    f: fn(*mut ()),
    ctx: *mut (),
}

// SAFETY: the executor hands over a context that outlives the program
unsafe impl Send for AlarmCallback {}

pub struct TickDriver {
    ticks: Mutex<Cell<u64>>,
    alarm_at: Mutex<Cell<u64>>,
    callback: Mutex<Cell<Option<AlarmCallback>>>,
    allocated: AtomicBool,
}

impl TickDriver {
    const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
            alarm_at: Mutex::new(Cell::new(u64::MAX)),
            callback: Mutex::new(Cell::new(None)),
            allocated: AtomicBool::new(false),
        }
    }

    /// Advance one tick (SysTick exception) and fire the alarm when due
    fn tick(&self) {
        let due = critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            let now = ticks.get() + 1;
            ticks.set(now);

            let alarm_at = self.alarm_at.borrow(cs);
            if now >= alarm_at.get() {
                alarm_at.set(u64::MAX);
                self.callback.borrow(cs).get()
            } else {
                None
            }
        });
        if let Some(callback) = due {
            (callback.f)(callback.ctx);
        }
    }
}

impl Driver for TickDriver {
    fn now(&self) -> u64 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        if self.allocated.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(AlarmHandle::new(0))
        }
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, callback: fn(*mut ()), ctx: *mut ()) {
        critical_section::with(|cs| {
            self.callback
                .borrow(cs)
                .set(Some(AlarmCallback { f: callback, ctx }))
        });
    }

    fn set_alarm(&self, _alarm: AlarmHandle, timestamp: u64) -> bool {
        critical_section::with(|cs| {
            let alarm_at = self.alarm_at.borrow(cs);
            if timestamp <= self.ticks.borrow(cs).get() {
                alarm_at.set(u64::MAX);
                false
            } else {
                alarm_at.set(timestamp);
                true
            }
        })
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: TickDriver = TickDriver::new());

/// SysTick exception body
pub fn on_tick() {
    DRIVER.tick();
}
