//! Interrupt entry points
//!
//! Each handler services one event source and touches only the engine that
//! owns it, inside a single critical section.

use instrument_core::{BandHit, HalError};

use crate::with_instrument;

fn report(result: Result<(), HalError>) {
    #[cfg(feature = "defmt")]
    if let Err(e) = result {
        defmt::warn!("⚠️ Interrupt handler failed: {}", e);
    }
    #[cfg(not(feature = "defmt"))]
    let _ = result;
}

/// TIM17 update: shadow counter step
pub fn shadow_tick() {
    with_instrument(|inst, board| {
        if board.digitizer_mut().acknowledge_shadow_tick() {
            inst.acquisition_mut().on_shadow_tick();
        }
    });
}

/// GPDMA1 channel 1 half/complete: move one staging half into the rings
pub fn conversions_ready() {
    with_instrument(|inst, board| {
        let digitizer = board.digitizer_mut();
        if let Some(half) = digitizer.take_filled_half() {
            let (ch0, ch1) = digitizer.staged(half);
            inst.acquisition_mut().on_conversions(&ch0, &ch1);
        }
    });
}

/// ADC1/ADC2 analog watchdogs. The far band is reported before the near one.
pub fn adc_watchdog(adc: usize) {
    report(with_instrument(|inst, board| -> Result<(), HalError> {
        let digitizer = board.digitizer_mut();
        let event = digitizer.take_watchdog(adc);
        let acquisition = inst.acquisition_mut();
        if event.far {
            acquisition.on_watchdog(BandHit::Far, digitizer)?;
        }
        if event.near {
            acquisition.on_watchdog(BandHit::Near, digitizer)?;
        }
        Ok(())
    }));
}

/// TIM5 compare: one logic port sample
pub fn logic_sample() {
    report(with_instrument(|inst, board| -> Result<(), HalError> {
        let port = board.logic_mut();
        if !port.take_sample_event() {
            return Ok(());
        }
        let value = port.read_inputs();
        inst.logic_mut().on_sample(value, port)
    }));
}

/// TIM16 update: logic post-trigger window elapsed
pub fn logic_confirm_elapsed() {
    report(with_instrument(|inst, board| -> Result<(), HalError> {
        let port = board.logic_mut();
        if !port.take_confirmation_event() {
            return Ok(());
        }
        inst.logic_mut().on_confirmation_elapsed(port)
    }));
}
