//! Logic analyzer trigger engine

use crate::hal::{HalError, LogicPort};
use crate::protocol::LogicSetCommand;
use crate::ring::SampleRing;
use crate::types::{CaptureState, LogicEdge, LogicTiming, BATCH_LEN};

/// Samples the parallel port into a ring and freezes it after an edge
pub struct LogicEngine<const N: usize> {
    ring: SampleRing<N>,
    state: CaptureState,
    pin_mask: u16,
    edge: LogicEdge,
    timing: LogicTiming,
    previous: u16,
    cursor: u16,
}

impl<const N: usize> LogicEngine<N> {
    const CAPACITY: u16 = if N > u16::MAX as usize { u16::MAX } else { N as u16 };

    pub const fn new() -> Self {
        Self {
            ring: SampleRing::new(),
            state: CaptureState::PreTrigger,
            pin_mask: 0,
            edge: LogicEdge::Falling,
            timing: LogicTiming::DEFAULT,
            previous: 0,
            cursor: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn pin_mask(&self) -> u16 {
        self.pin_mask
    }

    pub fn edge(&self) -> LogicEdge {
        self.edge
    }

    pub fn timing(&self) -> &LogicTiming {
        &self.timing
    }

    pub fn ring(&self) -> &SampleRing<N> {
        &self.ring
    }

    /// Apply a `LogicSet` command
    pub fn configure<P: LogicPort>(
        &mut self,
        cmd: &LogicSetCommand,
        hw: &mut P,
    ) -> Result<(), HalError> {
        self.pin_mask = cmd.trigger_pin;
        self.edge = LogicEdge::from_wire(cmd.trigger_edge);
        self.timing = cmd.timing;

        hw.stop_sampling()?;
        hw.stop_confirmation()?;
        self.state = CaptureState::PreTrigger;

        if cmd.starts() {
            hw.configure(&self.timing)?;
            self.ring.clear();
            self.cursor = 0;
            hw.start_sampling()?;
            #[cfg(feature = "defmt")]
            defmt::debug!("🔌 Logic armed: pin mask {:#x}, edge {}", self.pin_mask, self.edge);
        } else {
            #[cfg(feature = "defmt")]
            defmt::debug!("🔌 Logic stopped");
        }
        Ok(())
    }

    /// Sampling timer tick with the port value just read
    #[inline]
    pub fn on_sample<P: LogicPort>(&mut self, value: u16, hw: &mut P) -> Result<(), HalError> {
        if self.state == CaptureState::PreTrigger
            && self.edge.detect(self.previous, value, self.pin_mask)
        {
            self.state = CaptureState::TriggerState;
            hw.start_confirmation()?;
            #[cfg(feature = "defmt")]
            defmt::info!("🎯 Logic trigger");
        }
        self.ring.push(value);
        self.previous = value;
        Ok(())
    }

    /// Confirmation timer expired, freeze the capture for streaming
    ///
    /// Ignored unless a trigger is being confirmed, so an update left pending
    /// across a stop cannot restart streaming.
    pub fn on_confirmation_elapsed<P: LogicPort>(&mut self, hw: &mut P) -> Result<(), HalError> {
        if self.state != CaptureState::TriggerState {
            return Ok(());
        }
        hw.stop_sampling()?;
        hw.stop_confirmation()?;
        self.cursor = 0;
        self.state = CaptureState::PostTrigger;
        Ok(())
    }

    /// Advance the state machine and report whether a batch is ready
    pub fn poll<P: LogicPort>(&mut self, hw: &mut P) -> Result<bool, HalError> {
        if self.state != CaptureState::PostTrigger {
            return Ok(false);
        }
        if self.cursor < Self::CAPACITY {
            return Ok(true);
        }
        self.ring.clear();
        self.cursor = 0;
        self.state = CaptureState::PreTrigger;
        hw.start_sampling()?;
        #[cfg(feature = "defmt")]
        defmt::debug!("🔁 Logic re-armed");
        Ok(false)
    }

    pub fn batch(&self) -> [u16; BATCH_LEN] {
        self.ring.batch(self.cursor)
    }

    pub fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(BATCH_LEN as u16);
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn seek(&mut self, cursor: u16) {
        self.cursor = cursor;
    }
}

impl<const N: usize> Default for LogicEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}
