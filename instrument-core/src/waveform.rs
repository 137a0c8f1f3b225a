//! Two-channel generator with phase-aligned restart

use crate::hal::{HalError, WaveformTimers};
use crate::protocol::FRAME_LEN;
use crate::types::{AwgChannel, AwgChannelConfig, AWG_TABLE_LEN};

const TABLE_BYTES: usize = AWG_TABLE_LEN * 2;

/// Sample count below which the host still sends a 128-byte table
const SHORT_TABLE_SAMPLES: u16 = 32;
const SHORT_TABLE_BYTES: usize = 128;

/// Table bytes still expected from the host
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableUpload {
    pub channel: AwgChannel,
    pub written: usize,
    pub remaining: usize,
}

impl TableUpload {
    /// Byte count the host sends after an `AwgSet` with `sample_count`
    pub fn expected_bytes(sample_count: u16) -> usize {
        let bytes = if sample_count < SHORT_TABLE_SAMPLES {
            SHORT_TABLE_BYTES
        } else {
            sample_count as usize * 2
        };
        bytes.min(TABLE_BYTES)
    }
}

pub struct WaveformSynchronizer {
    configs: [AwgChannelConfig; 2],
    tables: [[u16; AWG_TABLE_LEN]; 2],
    upload: Option<TableUpload>,
}

impl WaveformSynchronizer {
    pub const fn new() -> Self {
        Self {
            configs: [AwgChannelConfig::DEFAULT; 2],
            tables: [[0; AWG_TABLE_LEN]; 2],
            upload: None,
        }
    }

    pub fn config(&self, channel: AwgChannel) -> &AwgChannelConfig {
        &self.configs[channel.index()]
    }

    pub fn table(&self, channel: AwgChannel) -> &[u16] {
        &self.tables[channel.index()][..self.table_len(channel)]
    }

    /// DMA length of a channel, clamped to the table
    pub fn table_len(&self, channel: AwgChannel) -> usize {
        (self.configs[channel.index()].sample_count as usize).min(AWG_TABLE_LEN)
    }

    pub fn upload(&self) -> Option<&TableUpload> {
        self.upload.as_ref()
    }

    pub fn upload_pending(&self) -> bool {
        self.upload.is_some()
    }

    /// Program both channels from their stored configs and start them
    pub fn boot<W: WaveformTimers>(&mut self, hw: &mut W) -> Result<(), HalError> {
        for channel in [AwgChannel::Out0, AwgChannel::Out1] {
            let config = self.configs[channel.index()];
            hw.program(channel, &config)?;
            hw.set_gain(channel, config.gain)?;
        }
        self.resync(hw)
    }

    /// Reconfigure one channel and restart both in phase, then expect its table
    pub fn apply<W: WaveformTimers>(
        &mut self,
        channel: AwgChannel,
        config: AwgChannelConfig,
        hw: &mut W,
    ) -> Result<(), HalError> {
        self.configs[channel.index()] = config;
        hw.program(channel, &config)?;
        hw.set_gain(channel, config.gain)?;
        self.resync(hw)?;

        let remaining = TableUpload::expected_bytes(config.sample_count);
        self.upload = Some(TableUpload {
            channel,
            written: 0,
            remaining,
        });

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "🌊 AWG {}: period {}, {} samples, {} table bytes",
            channel,
            config.period,
            config.sample_count,
            remaining
        );
        Ok(())
    }

    /// Disable both timers, restart DMA and enable them together
    pub fn resync<W: WaveformTimers>(&mut self, hw: &mut W) -> Result<(), HalError> {
        hw.halt()?;
        for channel in [AwgChannel::Out0, AwgChannel::Out1] {
            hw.restart_dma(channel, self.table(channel))?;
        }
        hw.commit(self.counter_presets())
    }

    /// Signed counter start offset of each channel
    pub fn phase_offsets(&self) -> [i32; 2] {
        let [a, b] = self.configs;
        [
            a.phase_offset as i32 - b.period as i32,
            b.phase_offset as i32 - a.period as i32,
        ]
    }

    /// Counter presets, the phase offsets modulo the 16-bit counter range
    pub fn counter_presets(&self) -> [u16; 2] {
        let [a, b] = self.configs;
        [
            a.phase_offset.wrapping_sub(b.period),
            b.phase_offset.wrapping_sub(a.period),
        ]
    }

    /// Copy one upload chunk into the open table. Returns true on the last chunk.
    pub fn accept_chunk(&mut self, chunk: &[u8; FRAME_LEN]) -> bool {
        let Some(upload) = self.upload.as_mut() else {
            return false;
        };

        let table = &mut self.tables[upload.channel.index()];
        let first = upload.written / 2;
        for (i, pair) in chunk.chunks_exact(2).enumerate() {
            if let Some(slot) = table.get_mut(first + i) {
                *slot = u16::from_le_bytes([pair[0], pair[1]]);
            }
        }
        upload.written += FRAME_LEN;
        upload.remaining = upload.remaining.saturating_sub(FRAME_LEN);

        if upload.remaining == 0 {
            self.upload = None;
            true
        } else {
            false
        }
    }
}

impl Default for WaveformSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}
