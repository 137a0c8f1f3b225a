#![no_std]
#![no_main]

use defmt_rtt as _;

// Panic handler
use panic_halt as _;

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::NVIC;
use cortex_m_rt::exception;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use awgscope_firmware::memory::{SYSCLK_HZ, TICK_HZ};
use awgscope_firmware::*;

/// STM32H563 interrupt lines in use (RM0481 vector table positions)
#[derive(Copy, Clone)]
#[repr(u16)]
enum Irq {
    Gpdma1Ch1 = 28,
    Adc1 = 37,
    Tim5 = 48,
    Adc2 = 69,
    Tim16 = 72,
    Tim17 = 73,
    UsbDrdFs = 74,
}

// SAFETY: every variant is a valid vector number below IRQ_COUNT
unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self as u16
    }
}

const IRQ_COUNT: usize = 131;

#[derive(Copy, Clone)]
#[repr(C)]
pub union Vector {
    handler: unsafe extern "C" fn(),
    reserved: usize,
}

extern "C" {
    fn DefaultHandler();
    /// Provided by the USB device class driver
    fn USB_DRD_FS();
}

#[link_section = ".vector_table.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Vector; IRQ_COUNT] = {
    let mut v = [Vector { handler: DefaultHandler }; IRQ_COUNT];
    v[Irq::Gpdma1Ch1 as usize] = Vector { handler: GPDMA1_CH1 };
    v[Irq::Adc1 as usize] = Vector { handler: ADC1 };
    v[Irq::Tim5 as usize] = Vector { handler: TIM5 };
    v[Irq::Adc2 as usize] = Vector { handler: ADC2 };
    v[Irq::Tim16 as usize] = Vector { handler: TIM16 };
    v[Irq::Tim17 as usize] = Vector { handler: TIM17 };
    v[Irq::UsbDrdFs as usize] = Vector { handler: USB_DRD_FS };
    v
};

#[no_mangle]
unsafe extern "C" fn GPDMA1_CH1() {
    interrupts::conversions_ready();
}

#[no_mangle]
unsafe extern "C" fn ADC1() {
    interrupts::adc_watchdog(0);
}

#[no_mangle]
unsafe extern "C" fn ADC2() {
    interrupts::adc_watchdog(1);
}

#[no_mangle]
unsafe extern "C" fn TIM5() {
    interrupts::logic_sample();
}

#[no_mangle]
unsafe extern "C" fn TIM16() {
    interrupts::logic_confirm_elapsed();
}

#[no_mangle]
unsafe extern "C" fn TIM17() {
    interrupts::shadow_tick();
}

#[exception]
fn SysTick() {
    on_tick();
}

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("🔧 AWG scope firmware {} starting...", VERSION);

    let Some(mut core) = cortex_m::Peripherals::take() else {
        fatal_halt();
    };

    if let Err(e) = boot() {
        defmt::error!("❌ Board bring-up failed: {}", e);
        fatal_halt();
    }
    defmt::info!("✅ Hardware initialized");

    core.SYST.set_clock_source(SystClkSource::Core);
    core.SYST.set_reload(SYSCLK_HZ / TICK_HZ - 1);
    core.SYST.clear_current();
    core.SYST.enable_interrupt();
    core.SYST.enable_counter();

    // Lower number wins: data movers above the comparators above USB
    // SAFETY: priorities are set before the lines are unmasked
    unsafe {
        core.NVIC.set_priority(Irq::Gpdma1Ch1, 0x00);
        core.NVIC.set_priority(Irq::Tim17, 0x10);
        core.NVIC.set_priority(Irq::Adc1, 0x20);
        core.NVIC.set_priority(Irq::Adc2, 0x20);
        core.NVIC.set_priority(Irq::Tim5, 0x20);
        core.NVIC.set_priority(Irq::Tim16, 0x30);
        core.NVIC.set_priority(Irq::UsbDrdFs, 0x40);
        for irq in [
            Irq::Gpdma1Ch1,
            Irq::Adc1,
            Irq::Adc2,
            Irq::Tim5,
            Irq::Tim16,
            Irq::Tim17,
            Irq::UsbDrdFs,
        ] {
            NVIC::unmask(irq);
        }
    }

    defmt::info!("🚀 Spawning control task...");
    spawner.must_spawn(control_task());

    defmt::info!("✨ Instrument ready!");

    // Main supervision loop
    loop {
        Timer::after(Duration::from_millis(500)).await;
        BOARD.lock(|board| board.borrow().heartbeat());
        defmt::trace!("💓 Heartbeat");
    }
}
