//! Streaming scheduler
//!
//! Run once per foreground iteration. Both engines are polled every time so
//! their state machines advance even while a command holds the gate.

use crate::decoder::Instrument;
use crate::hal::{HalError, InstrumentHal, Transport};
use crate::protocol::SampleFrame;

/// Frame counters since boot
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamStats {
    pub sent: u32,
    pub dropped: u32,
    pub interleaved: u32,
    pub analog_only: u32,
    pub logic_only: u32,
}

/// A frame the scheduler composed this iteration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Emission {
    pub frame: SampleFrame,
    /// False if the transport was busy and the frame was dropped
    pub delivered: bool,
}

#[derive(Default)]
pub struct StreamScheduler {
    stats: StreamStats,
}

impl StreamScheduler {
    pub const fn new() -> Self {
        Self {
            stats: StreamStats {
                sent: 0,
                dropped: 0,
                interleaved: 0,
                analog_only: 0,
                logic_only: 0,
            },
        }
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn service<H, const A: usize, const L: usize>(
        &mut self,
        inst: &mut Instrument<A, L>,
        hal: &mut H,
    ) -> Result<Option<Emission>, HalError>
    where
        H: InstrumentHal,
    {
        let analog_ready = inst.acquisition.poll(hal.digitizer())?;
        let logic_ready = inst.logic.poll(hal.logic_port())?;

        if inst.gate.is_held() || !(analog_ready || logic_ready) {
            return Ok(None);
        }

        let mut frame = SampleFrame::EMPTY;
        if analog_ready {
            frame.adc_cursor = inst.acquisition.cursor();
            (frame.ch0, frame.ch1) = inst.acquisition.batch();
        }
        if logic_ready {
            frame.logic_cursor = inst.logic.cursor();
            frame.logic = inst.logic.batch();
        }

        let delivered = match hal.transport().transmit(&frame.encode()) {
            Ok(()) => {
                self.stats.sent += 1;
                true
            }
            Err(HalError::TransportBusy) => {
                self.stats.dropped += 1;
                #[cfg(feature = "defmt")]
                defmt::trace!("⏭️ Sample frame dropped");
                false
            }
            Err(e) => return Err(e),
        };

        match (analog_ready, logic_ready) {
            (true, true) => self.stats.interleaved += 1,
            (true, false) => self.stats.analog_only += 1,
            _ => self.stats.logic_only += 1,
        }

        // Dropped batches are skipped, the host sees the cursor gap
        if analog_ready {
            inst.acquisition.advance();
        }
        if logic_ready {
            inst.logic.advance();
        }

        Ok(Some(Emission { frame, delivered }))
    }
}
