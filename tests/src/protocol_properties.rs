//! Property tests for the 64-byte frame codec

use instrument_core::hal::mock::MockInstrumentHal;
use instrument_core::test_utils::started_hal;
use instrument_core::*;
use proptest::prelude::*;

fn awg_config() -> impl Strategy<Value = AwgChannelConfig> {
    (any::<u8>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()).prop_map(
        |(gain, prescaler, period, compare_offset, sample_count, phase_offset)| AwgChannelConfig {
            prescaler,
            period,
            compare_offset,
            sample_count,
            phase_offset,
            gain,
        },
    )
}

fn front_end() -> impl Strategy<Value = FrontEndFlags> {
    any::<[bool; 6]>().prop_map(|[offset, attenuation, amp10, amp5, amp2_5, amp1]| FrontEndFlags {
        offset,
        attenuation,
        amp10,
        amp5,
        amp2_5,
        amp1,
    })
}

fn command() -> impl Strategy<Value = CommandFrame> {
    prop_oneof![
        any::<[u8; 4]>().prop_map(|magic| CommandFrame::Handshake { magic }),
        (any::<u8>(), awg_config())
            .prop_map(|(channel, config)| CommandFrame::AwgSet(AwgSetCommand { channel, config })),
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u16>(), any::<u8>(), front_end()).prop_map(
            |(channel, mode, trigger_mode, trigger_level, sample_time, front_end)| {
                CommandFrame::AdcSet(AdcSetCommand {
                    channel,
                    mode,
                    trigger_mode,
                    trigger_level,
                    sample_time,
                    front_end,
                })
            }
        ),
        (any::<u8>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u32>()).prop_map(
            |(control, trigger_pin, trigger_edge, period16, prescaler16, period32)| {
                CommandFrame::LogicSet(LogicSetCommand {
                    control,
                    trigger_pin,
                    trigger_edge,
                    timing: LogicTiming {
                        period16,
                        prescaler16,
                        period32,
                    },
                })
            }
        ),
    ]
}

fn sample_frame() -> impl Strategy<Value = SampleFrame> {
    (
        any::<u16>(),
        any::<u16>(),
        any::<[u16; BATCH_LEN]>(),
        any::<[u16; BATCH_LEN]>(),
        any::<[u16; BATCH_LEN]>(),
    )
        .prop_map(|(adc_cursor, logic_cursor, ch0, ch1, logic)| SampleFrame {
            adc_cursor,
            logic_cursor,
            ch0,
            ch1,
            logic,
        })
}

proptest! {
    #[test]
    fn commands_survive_encoding(cmd in command()) {
        let raw = cmd.encode();
        prop_assert_eq!(raw[0], cmd.tag());
        prop_assert_eq!(CommandFrame::parse(&raw), Ok(cmd));
    }

    #[test]
    fn sample_frames_survive_encoding(frame in sample_frame()) {
        let raw = frame.encode();
        prop_assert_eq!(raw[0], TAG_SAMPLES);
        prop_assert_eq!(SampleFrame::parse(&raw), Ok(frame));
        prop_assert_eq!(frame.has_analog(), frame.adc_cursor != NO_DATA_CURSOR);
    }

    #[test]
    fn trailing_bytes_are_ignored(cmd in command(), tail in any::<[u8; 32]>()) {
        let mut raw = cmd.encode();
        raw[FRAME_LEN - 32..].copy_from_slice(&tail);
        prop_assert_eq!(CommandFrame::parse(&raw), Ok(cmd));
    }

    #[test]
    fn unknown_tags_are_rejected_without_side_effects(
        tag in 4u8..=255,
        body in proptest::collection::vec(any::<u8>(), FRAME_LEN - 1),
    ) {
        let mut raw = [0u8; FRAME_LEN];
        raw[0] = tag;
        raw[1..].copy_from_slice(&body);
        prop_assert_eq!(CommandFrame::parse(&raw), Err(ProtocolError::UnknownTag(tag)));

        let mut inst = Instrument::<64, 64>::new(InstrumentConfig::DEFAULT);
        let mut hal: MockInstrumentHal = started_hal(&mut inst);
        let trigger = *inst.acquisition().trigger();

        prop_assert_eq!(inst.handle_frame(&raw, &mut hal), Ok(Dispatch::Rejected(tag)));
        prop_assert_eq!(hal.transport.rejections, 1);
        prop_assert_eq!(hal.transport.last().map(|f| f.payload()), Some(NOPACKET));
        prop_assert_eq!(*inst.acquisition().trigger(), trigger);
        prop_assert_eq!(inst.acquisition().state(), CaptureState::NoTrigger);
        prop_assert_eq!(inst.logic().state(), CaptureState::PreTrigger);
        prop_assert!(hal.digitizer.rate.is_none());
        prop_assert!(hal.waveform.ops.is_empty());
    }

    #[test]
    fn ack_never_parses_as_samples(tail in proptest::collection::vec(any::<u8>(), FRAME_LEN - 9)) {
        let mut raw = AckFrame.encode();
        raw[9..].copy_from_slice(&tail);
        prop_assert_eq!(AckFrame::parse(&raw), Ok(AckFrame));
        prop_assert!(SampleFrame::parse(&raw).is_err());
    }
}

#[test]
fn ack_carries_device_magic() {
    let raw = AckFrame.encode();
    assert_eq!(raw[0], TAG_ACK);
    assert_eq!(&raw[1..9], &ACK_MAGIC);
    assert!(raw[9..].iter().all(|&b| b == 0));
}

#[test]
fn ack_with_corrupt_magic_is_refused() {
    let mut raw = AckFrame.encode();
    raw[3] ^= 0x20;
    assert_eq!(AckFrame::parse(&raw), Err(ProtocolError::BadMagic));
}

#[test]
fn nopacket_is_nul_terminated() {
    assert_eq!(NOPACKET.len(), 9);
    assert_eq!(NOPACKET.last(), Some(&0));
}
