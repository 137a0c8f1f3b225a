//! Wire value and preset tables

use instrument_core::*;
use rstest::rstest;

#[rstest]
#[case(0, 5_000_000, 1, 9)]
#[case(1, 2_000_000, 4, 24)]
#[case(2, 1_000_000, 9, 49)]
#[case(3, 500_000, 19, 99)]
#[case(4, 200_000, 49, 249)]
#[case(5, 100_000, 99, 499)]
#[case(6, 50_000, 199, 999)]
#[case(7, 20_000, 499, 2499)]
#[case(8, 10_000, 999, 4999)]
#[case(9, 5_000, 1999, 9999)]
#[case(10, 2_000, 4999, 24999)]
#[case(11, 1_000, 9999, 49999)]
#[case(12, 5_000_000, 1, 9)]
#[case(255, 5_000_000, 1, 9)]
fn sample_rate_presets(
    #[case] mode: u8,
    #[case] hz: u32,
    #[case] conversion_period: u16,
    #[case] shadow_period: u16,
) {
    let rate = SampleRate::from_mode(mode);
    assert_eq!(rate.hz, hz);
    assert_eq!(rate.conversion_prescaler, 24);
    assert_eq!(rate.shadow_prescaler, 499);
    assert_eq!(rate.conversion_period, conversion_period);
    assert_eq!(rate.shadow_period, shadow_period);
}

#[rstest]
fn shadow_tick_spans_one_shadow_step(#[values(0, 1, 2, 5, 9, 11)] mode: u8) {
    let rate = SampleRate::from_mode(mode);
    let conversion_ticks = (rate.conversion_prescaler as u32 + 1) * (rate.conversion_period as u32 + 1);
    let shadow_ticks = (rate.shadow_prescaler as u32 + 1) * (rate.shadow_period as u32 + 1);
    assert_eq!(shadow_ticks, conversion_ticks * SHADOW_STEP as u32);
}

#[rstest]
#[case(0, Some(SampleTime::Cycles2_5))]
#[case(1, Some(SampleTime::Cycles6_5))]
#[case(2, Some(SampleTime::Cycles12_5))]
#[case(3, Some(SampleTime::Cycles24_5))]
#[case(4, Some(SampleTime::Cycles47_5))]
#[case(5, Some(SampleTime::Cycles92_5))]
#[case(6, Some(SampleTime::Cycles247_5))]
#[case(7, Some(SampleTime::Cycles640_5))]
#[case(8, None)]
#[case(255, None)]
fn sample_time_codes(#[case] wire: u8, #[case] expected: Option<SampleTime>) {
    assert_eq!(SampleTime::from_wire(wire), expected);
    if let Some(time) = expected {
        assert_eq!(time.code(), wire);
    }
}

#[rstest]
#[case(0, TriggerMode::Free)]
#[case(1, TriggerMode::RisingEdge)]
#[case(2, TriggerMode::FallingEdge)]
#[case(3, TriggerMode::Free)]
#[case(200, TriggerMode::Free)]
fn trigger_mode_wire_values(#[case] wire: u8, #[case] mode: TriggerMode) {
    assert_eq!(TriggerMode::from_wire(wire), mode);
    if wire <= 2 {
        assert_eq!(mode.to_wire(), wire);
    }
}

#[rstest]
#[case(LogicEdge::Rising, 0b00, 0b01, true)]
#[case(LogicEdge::Rising, 0b01, 0b01, false)]
#[case(LogicEdge::Rising, 0b01, 0b00, false)]
#[case(LogicEdge::Rising, 0b00, 0b10, false)]
#[case(LogicEdge::Falling, 0b01, 0b00, true)]
#[case(LogicEdge::Falling, 0b00, 0b00, false)]
#[case(LogicEdge::Falling, 0b00, 0b01, false)]
#[case(LogicEdge::Falling, 0b11, 0b10, true)]
fn logic_edge_matrix(
    #[case] edge: LogicEdge,
    #[case] previous: u16,
    #[case] current: u16,
    #[case] fires: bool,
) {
    assert_eq!(edge.detect(previous, current, 0b01), fires);
}

#[rstest]
#[case(0, LogicEdge::Falling)]
#[case(1, LogicEdge::Rising)]
#[case(0xFFFF, LogicEdge::Rising)]
fn logic_edge_wire_values(#[case] wire: u16, #[case] edge: LogicEdge) {
    assert_eq!(LogicEdge::from_wire(wire), edge);
}

#[rstest]
#[case(0, Some(AnalogChannel::Ch0), AnalogChannel::Ch0, AwgChannel::Out0)]
#[case(1, Some(AnalogChannel::Ch1), AnalogChannel::Ch1, AwgChannel::Out1)]
#[case(2, None, AnalogChannel::Ch1, AwgChannel::Out1)]
#[case(255, None, AnalogChannel::Ch1, AwgChannel::Out1)]
fn channel_selectors(
    #[case] wire: u8,
    #[case] strict: Option<AnalogChannel>,
    #[case] analog: AnalogChannel,
    #[case] output: AwgChannel,
) {
    assert_eq!(AnalogChannel::from_wire(wire), strict);
    assert_eq!(AnalogChannel::from_wire_lossy(wire), analog);
    assert_eq!(AwgChannel::from_wire_lossy(wire), output);
}

#[rstest]
#[case(0, 128)]
#[case(2, 128)]
#[case(31, 128)]
#[case(32, 64)]
#[case(100, 200)]
#[case(4096, 8192)]
#[case(5000, 8192)]
#[case(u16::MAX, 8192)]
fn table_upload_sizes(#[case] samples: u16, #[case] bytes: usize) {
    assert_eq!(TableUpload::expected_bytes(samples), bytes);
}

#[rstest]
#[case(TriggerMode::RisingEdge, 2000, Band::new(1985, 2015), Band::new(1935, 1965))]
#[case(TriggerMode::FallingEdge, 2000, Band::new(1985, 2015), Band::new(2035, 2065))]
#[case(TriggerMode::RisingEdge, 10, Band::new(0, 25), Band::new(0, 0))]
fn watchdog_bands(
    #[case] mode: TriggerMode,
    #[case] level: u16,
    #[case] near: Band,
    #[case] far: Band,
) {
    let bands = WatchdogCalibration::DEFAULT.bands(level, mode);
    assert_eq!(bands.near, near);
    assert_eq!(bands.far, far);
}

#[test]
fn capture_states_that_stream() {
    assert!(CaptureState::NoTrigger.streams());
    assert!(CaptureState::PostTrigger.streams());
    assert!(!CaptureState::PreTrigger.streams());
    assert!(!CaptureState::TriggerState.streams());
}
