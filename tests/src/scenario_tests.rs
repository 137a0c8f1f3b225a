//! End-to-end scenarios: host frames in, device frames out

use instrument_core::hal::mock::{MockInstrumentHal, WaveformOp};
use instrument_core::test_utils::{feed_analog, frames, signals, started_hal, HostLink, HostMessage};
use instrument_core::*;

const CAP: usize = 256;
type TestInstrument = Instrument<CAP, CAP>;

fn power_on() -> (TestInstrument, MockInstrumentHal, StreamScheduler) {
    let mut inst = TestInstrument::new(InstrumentConfig::DEFAULT);
    let hal = started_hal(&mut inst);
    (inst, hal, StreamScheduler::new())
}

/// Service until nothing is ready, returning every frame composed
fn stream_all(
    inst: &mut TestInstrument,
    hal: &mut MockInstrumentHal,
    sched: &mut StreamScheduler,
) -> Vec<SampleFrame> {
    let mut out = Vec::new();
    while let Some(emission) = sched.service(inst, hal).unwrap() {
        out.push(emission.frame);
    }
    out
}

#[test]
fn test_handshake_is_acknowledged_every_time() {
    let (mut inst, mut hal, _) = power_on();

    for _ in 0..3 {
        let dispatch = inst.handle_frame(&frames::handshake(), &mut hal).unwrap();
        assert_eq!(dispatch, Dispatch::Acked(CommandKind::Handshake));
    }
    assert_eq!(HostLink::drain(&hal.transport), vec![HostMessage::Ack; 3]);
}

#[test]
fn test_handshake_with_wrong_magic_is_silent() {
    let (mut inst, mut hal, _) = power_on();
    let raw = CommandFrame::Handshake { magic: *b"INIX" }.encode();

    assert_eq!(inst.handle_frame(&raw, &mut hal).unwrap(), Dispatch::Ignored);
    assert_eq!(hal.transport.transmitted, 0);
}

#[test]
fn test_unknown_tag_gets_nopacket_and_changes_nothing() {
    let (mut inst, mut hal, _) = power_on();
    let before_trigger = *inst.acquisition().trigger();
    let before_logic = inst.logic().state();

    let mut raw = [0u8; FRAME_LEN];
    raw[0] = 9;
    raw[1] = 0xAA;
    assert_eq!(inst.handle_frame(&raw, &mut hal).unwrap(), Dispatch::Rejected(9));

    assert_eq!(HostLink::drain(&hal.transport), vec![HostMessage::Rejection]);
    assert_eq!(hal.transport.last().unwrap().payload(), NOPACKET);
    assert_eq!(*inst.acquisition().trigger(), before_trigger);
    assert_eq!(inst.logic().state(), before_logic);
    assert!(hal.waveform.ops.is_empty());
}

#[test]
fn test_free_run_streams_whole_buffer_then_wraps() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.handle_frame(&frames::adc_free_run(3), &mut hal).unwrap();
    assert_eq!(hal.digitizer.rate, Some(SampleRate::from_mode(3)));
    assert_eq!(hal.digitizer.sample_time, Some(SampleTime::Cycles47_5));
    hal.transport.clear();

    let ramp: Vec<u16> = (0..CAP as u16).collect();
    inst.acquisition_mut().on_conversions(&ramp, &ramp);
    for _ in 0..3 {
        inst.acquisition_mut().on_shadow_tick();
    }
    let starts = hal.digitizer.starts;

    let streamed = stream_all(&mut inst, &mut hal, &mut sched);
    assert_eq!(streamed.len(), CAP / BATCH_LEN);
    for (i, frame) in streamed.iter().enumerate() {
        assert_eq!(frame.adc_cursor as usize, i * BATCH_LEN);
        assert_eq!(frame.logic_cursor, NO_DATA_CURSOR);
        assert_eq!(frame.ch0[0] as usize, i * BATCH_LEN);
    }

    // The poll that found the cursor at capacity restarted the capture
    assert_eq!(inst.acquisition().cursor(), 0);
    assert_eq!(inst.acquisition().shadow(), 0);
    assert_eq!(hal.digitizer.starts, starts + 1);
}

#[test]
fn test_free_run_waits_for_shadow_counter() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.acquisition_mut().on_conversions(&[1; 128], &[2; 128]);

    assert!(sched.service(&mut inst, &mut hal).unwrap().is_none());

    inst.acquisition_mut().on_shadow_tick();
    let streamed = stream_all(&mut inst, &mut hal, &mut sched);
    // 100 readable samples cover thirteen batches
    assert_eq!(streamed.len(), 13);
    assert_eq!(inst.acquisition().cursor(), 104);
}

#[test]
fn test_rising_trigger_capture_cycle() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.handle_frame(&frames::adc_trigger(0, 0, 1, 2000), &mut hal).unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::PreTrigger);
    assert!(hal.digitizer.armed.is_some());

    feed_analog(inst.acquisition_mut(), &mut hal.digitizer, &signals::rising_edge(2000)).unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::TriggerState);
    assert!(hal.digitizer.armed.is_none());

    // Nothing streams until the post-trigger window is in
    assert!(sched.service(&mut inst, &mut hal).unwrap().is_none());
    inst.acquisition_mut().on_shadow_tick();

    let stops = hal.digitizer.stops;
    let first = sched.service(&mut inst, &mut hal).unwrap().unwrap();
    assert_eq!(first.frame.adc_cursor, 0);
    assert_eq!(inst.acquisition().state(), CaptureState::PostTrigger);
    assert!(!hal.digitizer.running);
    assert_eq!(hal.digitizer.stops, stops + 1);

    let rest = stream_all(&mut inst, &mut hal, &mut sched);
    assert_eq!(rest.len() + 1, CAP / BATCH_LEN);

    // Fully streamed: re-armed, waiting for the next edge
    assert_eq!(inst.acquisition().state(), CaptureState::PreTrigger);
    assert!(hal.digitizer.armed.is_some());
    assert!(hal.digitizer.running);
}

#[test]
fn test_rising_trigger_ignores_falling_edge() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::adc_trigger(0, 0, 1, 2000), &mut hal).unwrap();

    feed_analog(inst.acquisition_mut(), &mut hal.digitizer, &signals::falling_edge(2000)).unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::PreTrigger);
}

#[test]
fn test_falling_trigger_on_channel_one() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::adc_trigger(1, 0, 2, 1500), &mut hal).unwrap();
    assert_eq!(inst.acquisition().trigger().channel, AnalogChannel::Ch1);

    feed_analog(inst.acquisition_mut(), &mut hal.digitizer, &signals::rising_edge(1500)).unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::PreTrigger);

    feed_analog(inst.acquisition_mut(), &mut hal.digitizer, &signals::falling_edge(1500)).unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::TriggerState);
}

#[test]
fn test_noise_at_level_never_triggers() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::adc_trigger(0, 0, 1, 2000), &mut hal).unwrap();

    feed_analog(
        inst.acquisition_mut(),
        &mut hal.digitizer,
        &signals::jitter_around(2000, 10, 200),
    )
    .unwrap();
    assert_eq!(inst.acquisition().state(), CaptureState::PreTrigger);
}

#[test]
fn test_reconfigure_mid_capture_discards_progress() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.acquisition_mut().on_conversions(&[7; 200], &[7; 200]);
    inst.acquisition_mut().on_shadow_tick();
    sched.service(&mut inst, &mut hal).unwrap();
    assert_eq!(inst.acquisition().cursor(), 8);

    inst.handle_frame(&frames::adc_free_run(5), &mut hal).unwrap();
    assert_eq!(inst.acquisition().cursor(), 0);
    assert_eq!(inst.acquisition().shadow(), 0);
    assert_eq!(inst.acquisition().channel(AnalogChannel::Ch0).write_index(), 0);
}

#[test]
fn test_logic_capture_streams_after_confirmation() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.handle_frame(&frames::logic_start(0x0004, 1), &mut hal).unwrap();
    assert!(hal.logic.sampling);
    assert_eq!(hal.logic.timing, Some(LogicTiming::DEFAULT));

    for value in signals::logic_pulse(0x0004, 0x0100, 3) {
        inst.logic_mut().on_sample(value, &mut hal.logic).unwrap();
    }
    assert_eq!(inst.logic().state(), CaptureState::TriggerState);
    assert!(hal.logic.confirming);

    inst.logic_mut().on_confirmation_elapsed(&mut hal.logic).unwrap();
    assert!(!hal.logic.sampling);
    hal.transport.clear();

    let streamed = stream_all(&mut inst, &mut hal, &mut sched);
    assert_eq!(streamed.len(), CAP / BATCH_LEN);
    let first = streamed[0];
    assert_eq!(first.adc_cursor, NO_DATA_CURSOR);
    assert_eq!(first.logic_cursor, 0);
    assert_eq!(&first.logic[..6], &[0x0100, 0x0100, 0x0104, 0x0104, 0x0104, 0x0100]);

    // Re-armed after the last batch
    assert_eq!(inst.logic().state(), CaptureState::PreTrigger);
    assert!(hal.logic.sampling);
}

#[test]
fn test_logic_falling_edge_needs_high_to_low() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::logic_start(0x0001, 0), &mut hal).unwrap();

    inst.logic_mut().on_sample(0, &mut hal.logic).unwrap();
    inst.logic_mut().on_sample(1, &mut hal.logic).unwrap();
    assert_eq!(inst.logic().state(), CaptureState::PreTrigger);

    inst.logic_mut().on_sample(0, &mut hal.logic).unwrap();
    assert_eq!(inst.logic().state(), CaptureState::TriggerState);
}

#[test]
fn test_logic_stop_idles_timers() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::logic_start(1, 1), &mut hal).unwrap();
    inst.handle_frame(&frames::logic_stop(), &mut hal).unwrap();

    assert!(!hal.logic.sampling);
    assert!(!hal.logic.confirming);
    assert_eq!(inst.logic().state(), CaptureState::PreTrigger);
}

#[test]
fn test_interleaved_frame_advances_both_cursors() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.acquisition_mut().seek(100, 200);
    inst.handle_frame(&frames::logic_start(1, 1), &mut hal).unwrap();
    inst.logic_mut().on_sample(0, &mut hal.logic).unwrap();
    inst.logic_mut().on_sample(1, &mut hal.logic).unwrap();
    inst.logic_mut().on_confirmation_elapsed(&mut hal.logic).unwrap();
    inst.logic_mut().seek(200);

    let emission = sched.service(&mut inst, &mut hal).unwrap().unwrap();
    assert_eq!((emission.frame.adc_cursor, emission.frame.logic_cursor), (100, 200));
    assert_eq!(inst.acquisition().cursor(), 108);
    assert_eq!(inst.logic().cursor(), 208);
    assert_eq!(sched.stats().interleaved, 1);
}

#[test]
fn test_logic_only_frame_carries_analog_sentinel() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.acquisition_mut().seek(100, 100);
    inst.handle_frame(&frames::logic_start(1, 1), &mut hal).unwrap();
    inst.logic_mut().on_sample(0, &mut hal.logic).unwrap();
    inst.logic_mut().on_sample(1, &mut hal.logic).unwrap();
    inst.logic_mut().on_confirmation_elapsed(&mut hal.logic).unwrap();
    inst.logic_mut().seek(200);

    let emission = sched.service(&mut inst, &mut hal).unwrap().unwrap();
    assert_eq!((emission.frame.adc_cursor, emission.frame.logic_cursor), (NO_DATA_CURSOR, 200));
    assert_eq!(inst.acquisition().cursor(), 100);
}

#[test]
fn test_generator_phase_alignment_and_tables() {
    let (mut inst, mut hal, _) = power_on();
    let table0: Vec<u16> = (0..64).map(|i| i * 64).collect();
    let table1: Vec<u16> = (0..64).map(|i| 4095 - i * 64).collect();

    inst.handle_frame(&frames::awg(0, 300, 50, 16), &mut hal).unwrap();
    let chunks = frames::table_chunks(&table0);
    assert_eq!(chunks.len(), 2);
    assert_eq!(
        inst.handle_frame(&chunks[0], &mut hal).unwrap(),
        Dispatch::TableChunk { complete: false }
    );
    assert_eq!(
        inst.handle_frame(&chunks[1], &mut hal).unwrap(),
        Dispatch::TableChunk { complete: true }
    );

    inst.handle_frame(&frames::awg(1, 400, 120, 16), &mut hal).unwrap();
    for chunk in frames::table_chunks(&table1) {
        inst.handle_frame(&chunk, &mut hal).unwrap();
    }

    // One Ack per command, one per completed table
    assert_eq!(hal.transport.acks, 4);
    assert_eq!(inst.waveform().phase_offsets(), [-350, -180]);
    assert_eq!(
        inst.waveform().counter_presets(),
        [(-350i32) as u16, (-180i32) as u16]
    );
    assert_eq!(inst.waveform().table(AwgChannel::Out0), &table0[..16]);
    assert_eq!(inst.waveform().table(AwgChannel::Out1), &table1[..16]);
    assert_eq!(
        hal.waveform.ops.last(),
        Some(&WaveformOp::Commit(inst.waveform().counter_presets()))
    );
}

#[test]
fn test_frames_during_upload_are_table_data() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::awg(0, 300, 0, 64), &mut hal).unwrap();

    // Looks like a handshake but lands in the table
    let dispatch = inst.handle_frame(&frames::handshake(), &mut hal).unwrap();
    assert_eq!(dispatch, Dispatch::TableChunk { complete: false });
    assert_eq!(inst.waveform().table(AwgChannel::Out0)[0], u16::from_le_bytes([0, b'I']));
    assert_eq!(hal.transport.acks, 1);
}

#[test]
fn test_out_of_range_generator_channel_maps_to_second_output() {
    let (mut inst, mut hal, _) = power_on();
    inst.handle_frame(&frames::awg(7, 999, 0, 8), &mut hal).unwrap();
    assert_eq!(inst.waveform().config(AwgChannel::Out1).period, 999);
    assert_eq!(inst.waveform().config(AwgChannel::Out0).period, AwgChannelConfig::DEFAULT.period);
}

#[test]
fn test_front_end_only_for_known_channels() {
    let (mut inst, mut hal, _) = power_on();
    let mut cmd = AdcSetCommand {
        channel: 1,
        mode: 0,
        trigger_mode: 0,
        trigger_level: 0,
        sample_time: 2,
        front_end: FrontEndFlags {
            attenuation: true,
            amp2_5: true,
            ..Default::default()
        },
    };
    inst.handle_frame(&CommandFrame::AdcSet(cmd).encode(), &mut hal).unwrap();
    assert_eq!(hal.front_end.applied[1], Some(cmd.front_end));
    assert_eq!(hal.digitizer.sample_time, Some(SampleTime::Cycles12_5));

    cmd.channel = 4;
    let writes = hal.front_end.writes;
    inst.handle_frame(&CommandFrame::AdcSet(cmd).encode(), &mut hal).unwrap();
    assert_eq!(hal.front_end.writes, writes);
    assert_eq!(inst.acquisition().trigger().channel, AnalogChannel::Ch1);
}

#[test]
fn test_busy_transport_drops_and_counts() {
    let (mut inst, mut hal, mut sched) = power_on();
    inst.acquisition_mut().on_conversions(&[0; 128], &[0; 128]);
    inst.acquisition_mut().on_shadow_tick();
    hal.transport.set_busy(true);

    let streamed = stream_all(&mut inst, &mut hal, &mut sched);
    assert_eq!(streamed.len(), 13);
    assert_eq!(sched.stats().dropped, 13);
    assert_eq!(hal.transport.refused, 13);

    // Acks are dropped the same way, the command still applies
    assert_eq!(
        inst.handle_frame(&frames::adc_free_run(2), &mut hal).unwrap(),
        Dispatch::Acked(CommandKind::AdcSet)
    );
    assert_eq!(hal.digitizer.rate, Some(SampleRate::from_mode(2)));
}
