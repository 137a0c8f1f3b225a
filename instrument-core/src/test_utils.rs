//! Test utilities for instrument core functionality

use std::vec::Vec;

use crate::acquisition::AcquisitionEngine;
use crate::hal::mock::{MockInstrumentHal, MockTransport};
use crate::hal::{Digitizer, HalError};
use crate::protocol::{
    AckFrame, AdcSetCommand, AwgSetCommand, CommandFrame, LogicSetCommand, RawFrame,
    SampleFrame, FRAME_LEN, HANDSHAKE_MAGIC, NOPACKET,
};
use crate::types::{AwgChannelConfig, FrontEndFlags, LogicTiming};

pub mod signals {
    //! Synthetic analog and logic input sequences

    use super::*;

    /// Linear ramp from `from` towards `to`, endpoints included
    pub fn ramp(from: u16, to: u16, step: u16) -> Vec<u16> {
        let step = step.max(1);
        let mut out = Vec::new();
        let mut value = from;
        if from <= to {
            while value < to {
                out.push(value);
                value = value.saturating_add(step);
            }
        } else {
            while value > to {
                out.push(value);
                value = value.saturating_sub(step);
            }
        }
        out.push(to);
        out
    }

    /// Signal crossing `level` from well below
    pub fn rising_edge(level: u16) -> Vec<u16> {
        ramp(level.saturating_sub(200), level.saturating_add(200), 5)
    }

    /// Signal crossing `level` from well above
    pub fn falling_edge(level: u16) -> Vec<u16> {
        ramp(level.saturating_add(200), level.saturating_sub(200), 5)
    }

    /// Noise that stays inside the near band only
    pub fn jitter_around(level: u16, amplitude: u16, count: usize) -> Vec<u16> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    level.saturating_add(amplitude)
                } else {
                    level.saturating_sub(amplitude)
                }
            })
            .collect()
    }

    /// Port values toggling `pin` low -> high -> low
    pub fn logic_pulse(pin: u16, idle: u16, width: usize) -> Vec<u16> {
        let base = idle & !pin;
        let mut out = std::vec![base, base];
        out.extend(std::iter::repeat(base | pin).take(width));
        out.push(base);
        out
    }

    /// Counter pattern on the whole port
    pub fn logic_counter(count: usize) -> Vec<u16> {
        (0..count).map(|i| i as u16).collect()
    }
}

/// Feed conversions into an engine, raising watchdog hits the way the
/// comparators would for the armed channel
pub fn feed_analog<D: Digitizer, const N: usize>(
    engine: &mut AcquisitionEngine<N>,
    hw: &mut D,
    samples: &[u16],
) -> Result<(), HalError> {
    for &sample in samples {
        engine.on_conversion(sample, sample);
        if let Some((_, bands)) = engine.armed_watch() {
            if let Some(hit) = bands.classify(sample) {
                engine.on_watchdog(hit, hw)?;
            }
        }
    }
    Ok(())
}

pub mod frames {
    //! Host command frame builders

    use super::*;

    pub fn handshake() -> RawFrame {
        CommandFrame::Handshake { magic: HANDSHAKE_MAGIC }.encode()
    }

    pub fn adc_free_run(mode: u8) -> RawFrame {
        adc_trigger(0, mode, 0, 0)
    }

    pub fn adc_trigger(channel: u8, mode: u8, trigger_mode: u8, level: u16) -> RawFrame {
        CommandFrame::AdcSet(AdcSetCommand {
            channel,
            mode,
            trigger_mode,
            trigger_level: level,
            sample_time: 0xFF,
            front_end: FrontEndFlags::default(),
        })
        .encode()
    }

    pub fn awg(channel: u8, period: u16, phase_offset: u16, sample_count: u16) -> RawFrame {
        CommandFrame::AwgSet(AwgSetCommand {
            channel,
            config: AwgChannelConfig {
                period,
                phase_offset,
                sample_count,
                ..AwgChannelConfig::DEFAULT
            },
        })
        .encode()
    }

    pub fn logic_start(pin: u16, edge: u16) -> RawFrame {
        CommandFrame::LogicSet(LogicSetCommand {
            control: 1,
            trigger_pin: pin,
            trigger_edge: edge,
            timing: LogicTiming::DEFAULT,
        })
        .encode()
    }

    pub fn logic_stop() -> RawFrame {
        CommandFrame::LogicSet(LogicSetCommand {
            control: 0,
            trigger_pin: 0,
            trigger_edge: 0,
            timing: LogicTiming::DEFAULT,
        })
        .encode()
    }

    /// Generator table as upload chunks
    pub fn table_chunks(samples: &[u16]) -> Vec<RawFrame> {
        samples
            .chunks(FRAME_LEN / 2)
            .map(|chunk| {
                let mut raw = [0u8; FRAME_LEN];
                for (i, sample) in chunk.iter().enumerate() {
                    raw[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
                }
                raw
            })
            .collect()
    }
}

/// What the host would make of one device transmission
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HostMessage {
    Ack,
    Samples(SampleFrame),
    Rejection,
    Garbage,
}

/// Host-side view of the device output
pub struct HostLink;

impl HostLink {
    pub fn decode(bytes: &[u8]) -> HostMessage {
        if bytes == NOPACKET {
            return HostMessage::Rejection;
        }
        let Ok(raw) = <&RawFrame>::try_from(bytes) else {
            return HostMessage::Garbage;
        };
        if AckFrame::parse(raw).is_ok() {
            return HostMessage::Ack;
        }
        match SampleFrame::parse(raw) {
            Ok(frame) => HostMessage::Samples(frame),
            Err(_) => HostMessage::Garbage,
        }
    }

    /// Every message still held by the transport log
    pub fn drain(transport: &MockTransport) -> Vec<HostMessage> {
        transport.sent().map(|f| Self::decode(f.payload())).collect()
    }

    /// Sample frames only
    pub fn samples(transport: &MockTransport) -> Vec<SampleFrame> {
        Self::drain(transport)
            .into_iter()
            .filter_map(|m| match m {
                HostMessage::Samples(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }
}

/// Board mock with the instrument already started
pub fn started_hal<const A: usize, const L: usize>(
    inst: &mut crate::decoder::Instrument<A, L>,
) -> MockInstrumentHal {
    let mut hal = MockInstrumentHal::new();
    let _ = inst.start(&mut hal);
    hal.transport.clear();
    hal.waveform.clear_ops();
    hal
}
