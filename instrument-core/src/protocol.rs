//! Host wire protocol
//!
//! Every frame in either direction is 64 bytes, packed and little-endian.
//! Byte 0 is the tag.

use crate::types::{AwgChannelConfig, FrontEndFlags, LogicTiming, BATCH_LEN, NO_DATA_CURSOR};

/// Size of every bulk frame
pub const FRAME_LEN: usize = 64;

/// One bulk transfer worth of bytes
pub type RawFrame = [u8; FRAME_LEN];

/// Magic a host must send in a handshake
pub const HANDSHAKE_MAGIC: [u8; 4] = *b"INIT";

/// Magic carried by every acknowledgement
pub const ACK_MAGIC: [u8; 8] = *b"STMAWG23";

/// Rejection sent for unknown tags, terminating NUL included
pub const NOPACKET: &[u8] = b"nopacket\0";

pub const TAG_HANDSHAKE: u8 = 0;
pub const TAG_AWG_SET: u8 = 1;
pub const TAG_ADC_SET: u8 = 2;
pub const TAG_LOGIC_SET: u8 = 3;
pub const TAG_ACK: u8 = 0;
pub const TAG_SAMPLES: u8 = 5;

/// Bytes of a sample frame before the zero padding
pub const SAMPLE_FRAME_PAYLOAD: usize = 1 + 2 + 2 + 3 * BATCH_LEN * 2;

const _: () = assert!(SAMPLE_FRAME_PAYLOAD <= FRAME_LEN);

/// Protocol decoding errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Tag byte is not a known command
    UnknownTag(u8),
    /// Frame parsed as one kind carries another kind's tag
    UnexpectedTag { expected: u8, found: u8 },
    /// Acknowledgement without the device magic
    BadMagic,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::UnknownTag(tag) => write!(f, "Unknown frame tag {}", tag),
            ProtocolError::UnexpectedTag { expected, found } => {
                write!(f, "Expected frame tag {}, found {}", expected, found)
            }
            ProtocolError::BadMagic => write!(f, "Acknowledgement magic mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

#[inline]
fn read_u16(buf: &RawFrame, at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn read_u32(buf: &RawFrame, at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
fn write_u16(buf: &mut RawFrame, at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

/// Generator reconfiguration request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AwgSetCommand {
    /// Raw output selector, 0 or anything else
    pub channel: u8,
    pub config: AwgChannelConfig,
}

/// Oscilloscope reconfiguration request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcSetCommand {
    pub channel: u8,
    /// Sample-rate preset index
    pub mode: u8,
    pub trigger_mode: u8,
    pub trigger_level: u16,
    /// Sampling-time preset index
    pub sample_time: u8,
    pub front_end: FrontEndFlags,
}

/// Logic analyzer reconfiguration request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicSetCommand {
    /// 1 starts sampling, anything else stops it
    pub control: u8,
    /// Port bit mask the trigger watches
    pub trigger_pin: u16,
    pub trigger_edge: u16,
    pub timing: LogicTiming,
}

impl LogicSetCommand {
    pub const fn starts(&self) -> bool {
        self.control == 1
    }
}

/// Decoded host command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandFrame {
    Handshake { magic: [u8; 4] },
    AwgSet(AwgSetCommand),
    AdcSet(AdcSetCommand),
    LogicSet(LogicSetCommand),
}

impl CommandFrame {
    /// Decode a host frame by its tag
    pub fn parse(buf: &RawFrame) -> Result<Self, ProtocolError> {
        match buf[0] {
            TAG_HANDSHAKE => Ok(CommandFrame::Handshake {
                magic: [buf[1], buf[2], buf[3], buf[4]],
            }),
            TAG_AWG_SET => Ok(CommandFrame::AwgSet(AwgSetCommand {
                channel: buf[1],
                config: AwgChannelConfig {
                    gain: buf[2],
                    prescaler: read_u16(buf, 3),
                    period: read_u16(buf, 5),
                    compare_offset: read_u16(buf, 7),
                    sample_count: read_u16(buf, 9),
                    phase_offset: read_u16(buf, 11),
                },
            })),
            TAG_ADC_SET => Ok(CommandFrame::AdcSet(AdcSetCommand {
                channel: buf[1],
                mode: buf[2],
                trigger_mode: buf[3],
                trigger_level: read_u16(buf, 4),
                sample_time: buf[6],
                front_end: FrontEndFlags {
                    offset: buf[7] != 0,
                    attenuation: buf[8] != 0,
                    amp10: buf[9] != 0,
                    amp5: buf[10] != 0,
                    amp2_5: buf[11] != 0,
                    amp1: buf[12] != 0,
                },
            })),
            TAG_LOGIC_SET => Ok(CommandFrame::LogicSet(LogicSetCommand {
                control: buf[1],
                trigger_pin: read_u16(buf, 2),
                trigger_edge: read_u16(buf, 4),
                timing: LogicTiming {
                    period16: read_u16(buf, 6),
                    prescaler16: read_u16(buf, 8),
                    period32: read_u32(buf, 10),
                },
            })),
            tag => Err(ProtocolError::UnknownTag(tag)),
        }
    }

    /// Encode as the host would send it
    pub fn encode(&self) -> RawFrame {
        let mut buf = [0u8; FRAME_LEN];
        match self {
            CommandFrame::Handshake { magic } => {
                buf[0] = TAG_HANDSHAKE;
                buf[1..5].copy_from_slice(magic);
            }
            CommandFrame::AwgSet(cmd) => {
                buf[0] = TAG_AWG_SET;
                buf[1] = cmd.channel;
                buf[2] = cmd.config.gain;
                write_u16(&mut buf, 3, cmd.config.prescaler);
                write_u16(&mut buf, 5, cmd.config.period);
                write_u16(&mut buf, 7, cmd.config.compare_offset);
                write_u16(&mut buf, 9, cmd.config.sample_count);
                write_u16(&mut buf, 11, cmd.config.phase_offset);
            }
            CommandFrame::AdcSet(cmd) => {
                buf[0] = TAG_ADC_SET;
                buf[1] = cmd.channel;
                buf[2] = cmd.mode;
                buf[3] = cmd.trigger_mode;
                write_u16(&mut buf, 4, cmd.trigger_level);
                buf[6] = cmd.sample_time;
                for (slot, level) in buf[7..13].iter_mut().zip(cmd.front_end.levels()) {
                    *slot = level as u8;
                }
            }
            CommandFrame::LogicSet(cmd) => {
                buf[0] = TAG_LOGIC_SET;
                buf[1] = cmd.control;
                write_u16(&mut buf, 2, cmd.trigger_pin);
                write_u16(&mut buf, 4, cmd.trigger_edge);
                write_u16(&mut buf, 6, cmd.timing.period16);
                write_u16(&mut buf, 8, cmd.timing.prescaler16);
                buf[10..14].copy_from_slice(&cmd.timing.period32.to_le_bytes());
            }
        }
        buf
    }

    pub const fn tag(&self) -> u8 {
        match self {
            CommandFrame::Handshake { .. } => TAG_HANDSHAKE,
            CommandFrame::AwgSet(_) => TAG_AWG_SET,
            CommandFrame::AdcSet(_) => TAG_ADC_SET,
            CommandFrame::LogicSet(_) => TAG_LOGIC_SET,
        }
    }
}

/// Command acknowledgement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AckFrame;

impl AckFrame {
    pub const fn encode(&self) -> RawFrame {
        let mut buf = [0u8; FRAME_LEN];
        buf[0] = TAG_ACK;
        let mut i = 0;
        while i < ACK_MAGIC.len() {
            buf[1 + i] = ACK_MAGIC[i];
            i += 1;
        }
        buf
    }

    pub fn parse(buf: &RawFrame) -> Result<Self, ProtocolError> {
        if buf[0] != TAG_ACK {
            return Err(ProtocolError::UnexpectedTag {
                expected: TAG_ACK,
                found: buf[0],
            });
        }
        if buf[1..1 + ACK_MAGIC.len()] != ACK_MAGIC {
            return Err(ProtocolError::BadMagic);
        }
        Ok(AckFrame)
    }
}

/// Interleaved oscilloscope and logic data
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleFrame {
    /// Read cursor of the analog batches, or `NO_DATA_CURSOR`
    pub adc_cursor: u16,
    /// Read cursor of the logic batch, or `NO_DATA_CURSOR`
    pub logic_cursor: u16,
    pub ch0: [u16; BATCH_LEN],
    pub ch1: [u16; BATCH_LEN],
    pub logic: [u16; BATCH_LEN],
}

impl SampleFrame {
    /// Frame with no data on either source
    pub const EMPTY: Self = Self {
        adc_cursor: NO_DATA_CURSOR,
        logic_cursor: NO_DATA_CURSOR,
        ch0: [0; BATCH_LEN],
        ch1: [0; BATCH_LEN],
        logic: [0; BATCH_LEN],
    };

    pub const fn has_analog(&self) -> bool {
        self.adc_cursor != NO_DATA_CURSOR
    }

    pub const fn has_logic(&self) -> bool {
        self.logic_cursor != NO_DATA_CURSOR
    }

    pub fn encode(&self) -> RawFrame {
        let mut buf = [0u8; FRAME_LEN];
        buf[0] = TAG_SAMPLES;
        write_u16(&mut buf, 1, self.adc_cursor);
        write_u16(&mut buf, 3, self.logic_cursor);
        let blocks = [&self.ch0, &self.ch1, &self.logic];
        for (b, block) in blocks.iter().enumerate() {
            let base = 5 + b * BATCH_LEN * 2;
            for (i, sample) in block.iter().enumerate() {
                write_u16(&mut buf, base + i * 2, *sample);
            }
        }
        buf
    }

    pub fn parse(buf: &RawFrame) -> Result<Self, ProtocolError> {
        if buf[0] != TAG_SAMPLES {
            return Err(ProtocolError::UnexpectedTag {
                expected: TAG_SAMPLES,
                found: buf[0],
            });
        }
        let block = |b: usize| {
            let base = 5 + b * BATCH_LEN * 2;
            let mut out = [0u16; BATCH_LEN];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = read_u16(buf, base + i * 2);
            }
            out
        };
        Ok(Self {
            adc_cursor: read_u16(buf, 1),
            logic_cursor: read_u16(buf, 3),
            ch0: block(0),
            ch1: block(1),
            logic: block(2),
        })
    }
}
