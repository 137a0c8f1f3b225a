//! Fixed-capacity sample rings
//!
//! Producers push at the write index, which wraps at capacity. The read
//! cursor is owned by the engine that streams the ring, so batches are read
//! by explicit position.

use crate::types::BATCH_LEN;

/// Circular store of `N` samples
pub struct SampleRing<const N: usize> {
    data: [u16; N],
    write: usize,
}

impl<const N: usize> SampleRing<N> {
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            write: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Index the next sample will be stored at
    pub fn write_index(&self) -> usize {
        self.write
    }

    /// Store a sample, overwriting the oldest once full
    #[inline]
    pub fn push(&mut self, sample: u16) {
        if N == 0 {
            return;
        }
        self.data[self.write] = sample;
        self.write += 1;
        if self.write >= N {
            self.write = 0;
        }
    }

    pub fn extend_from_slice(&mut self, samples: &[u16]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Copy `BATCH_LEN` samples starting at `cursor`, wrapping at capacity
    pub fn batch(&self, cursor: u16) -> [u16; BATCH_LEN] {
        let mut out = [0u16; BATCH_LEN];
        if N == 0 {
            return out;
        }
        let start = cursor as usize % N;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.data[(start + i) % N];
        }
        out
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.data.get(index).copied()
    }

    /// Restart the producer at index 0, keeping stored samples
    pub fn reset_write(&mut self) {
        self.write = 0;
    }

    /// Zero every sample and restart the producer
    pub fn clear(&mut self) {
        self.data = [0; N];
        self.write = 0;
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
