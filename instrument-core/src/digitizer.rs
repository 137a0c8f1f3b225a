//! Bookkeeping shared by [`Digitizer`](crate::hal::Digitizer) implementations
//!
//! The board fills a circular staging buffer of two `HALF`-sample halves and
//! hands each completed half to the acquisition engine. These types track
//! which half is in flight and what is left over when the transfer stops.

/// Half of the staging buffer the DMA is currently filling
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StagingHalves<const HALF: usize> {
    next: usize,
}

/// Staged samples that were never delivered as a completed half
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedTail {
    /// Completed half whose interrupt was not serviced before the stop
    pub full: Option<usize>,
    pub partial_half: usize,
    pub partial_len: usize,
}

impl<const HALF: usize> StagingHalves<HALF> {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Transfer restarted at the beginning of half 0
    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn next(&self) -> usize {
        self.next
    }

    /// Half `half` was delivered
    pub fn completed(&mut self, half: usize) {
        self.next = (half & 1) ^ 1;
    }

    /// Work out the undelivered samples after a stop
    ///
    /// `written` counts samples stored in the current circular block,
    /// `half_pending` is set when a half event was latched but not serviced.
    pub fn tail(&mut self, written: usize, half_pending: bool) -> StagedTail {
        let mut half = self.next;
        let full = if half_pending {
            let done = half;
            half ^= 1;
            Some(done)
        } else {
            None
        };
        let partial_len = written.saturating_sub(half * HALF).min(HALF);
        self.next = 0;
        StagedTail {
            full,
            partial_half: half,
            partial_len,
        }
    }
}

impl<const HALF: usize> Default for StagingHalves<HALF> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot skip of the spurious comparator event raised on enable
///
/// Only the converter that was armed may consume the skip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SettlingSkip {
    armed: Option<usize>,
}

impl SettlingSkip {
    pub const fn new() -> Self {
        Self { armed: None }
    }

    pub fn arm(&mut self, adc: usize) {
        self.armed = Some(adc);
    }

    pub fn clear(&mut self) {
        self.armed = None;
    }

    /// True if this event from `adc` is the one to discard
    pub fn consume(&mut self, adc: usize) -> bool {
        if self.armed == Some(adc) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}
