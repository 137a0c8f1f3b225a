#![no_std]

//! Firmware library: STM32H563 board support, interrupt entry points and
//! the foreground task around [`instrument_core`]

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub use embassy_executor::Spawner;
pub use embassy_time::Duration;

pub use instrument_core::*;

pub mod interrupts;
pub mod memory;
pub mod pins;
mod regs;
pub mod stm32h5_hardware;
pub mod tasks;
mod time_driver;
pub mod usb;

pub use stm32h5_hardware::Board;
pub use tasks::*;
pub use time_driver::on_tick;

/// Instrument state shared by the foreground task and the interrupt handlers
pub static INSTRUMENT: Mutex<CriticalSectionRawMutex, RefCell<DefaultInstrument>> =
    Mutex::new(RefCell::new(Instrument::new(InstrumentConfig::DEFAULT)));

pub static BOARD: Mutex<CriticalSectionRawMutex, RefCell<Board>> =
    Mutex::new(RefCell::new(Board::new()));

/// Run `f` with the instrument and the board, interrupts masked
pub fn with_instrument<R>(f: impl FnOnce(&mut DefaultInstrument, &mut Board) -> R) -> R {
    INSTRUMENT.lock(|inst| BOARD.lock(|board| f(&mut *inst.borrow_mut(), &mut *board.borrow_mut())))
}

/// Bring up the board and start acquisition and generators
pub fn boot() -> Result<(), HalError> {
    with_instrument(|inst, board| {
        board.initialize()?;
        inst.start(board)?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "🚀 Instrument started: acquisition {}, logic {}",
            inst.acquisition().state(),
            inst.logic().state()
        );
        Ok(())
    })
}

/// Unrecoverable error: mask interrupts and stop
pub fn fatal_halt() -> ! {
    #[cfg(feature = "defmt")]
    defmt::error!("💀 Fatal error, halting");

    #[cfg(feature = "embedded")]
    cortex_m::interrupt::disable();

    loop {
        core::hint::spin_loop();
    }
}
