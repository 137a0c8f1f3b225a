//! Interrupt producers and the foreground loop as tokio tasks
//!
//! Producers stand in for the ISRs and the USB receive path; the consumer
//! owns the instrument the way the control task does on the board.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use instrument_core::hal::mock::MockInstrumentHal;
use instrument_core::test_utils::{frames, started_hal, HostLink, HostMessage};
use instrument_core::*;

const CAP: usize = 256;
const PACE: Duration = Duration::from_micros(150);

#[derive(Debug)]
enum Event {
    Host(RawFrame),
    Conversions(Vec<u16>),
    ShadowTick,
    LogicSample(u16),
    ConfirmationElapsed,
}

struct Foreground {
    inst: Instrument<CAP, CAP>,
    hal: MockInstrumentHal,
    scheduler: StreamScheduler,
    streamed: Vec<SampleFrame>,
}

impl Foreground {
    fn new() -> Self {
        let mut inst = Instrument::new(InstrumentConfig::DEFAULT);
        let hal = started_hal(&mut inst);
        Self {
            inst,
            hal,
            scheduler: StreamScheduler::new(),
            streamed: Vec::new(),
        }
    }

    fn deliver(&mut self, event: Event) {
        match event {
            Event::Host(raw) => {
                self.inst.handle_frame(&raw, &mut self.hal).unwrap();
            }
            Event::Conversions(samples) => {
                self.inst.acquisition_mut().on_conversions(&samples, &samples)
            }
            Event::ShadowTick => self.inst.acquisition_mut().on_shadow_tick(),
            Event::LogicSample(value) => {
                self.inst.logic_mut().on_sample(value, &mut self.hal.logic).unwrap()
            }
            Event::ConfirmationElapsed => {
                self.inst.logic_mut().on_confirmation_elapsed(&mut self.hal.logic).unwrap()
            }
        }
    }

    /// Apply events as they arrive, streaming paced frames in between
    async fn run(&mut self, mut rx: mpsc::Receiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.deliver(event);
            while let Some(emission) = self.scheduler.service(&mut self.inst, &mut self.hal).unwrap() {
                self.streamed.push(emission.frame);
                time::sleep(PACE).await;
            }
        }
    }
}

fn spawn_producer(tx: mpsc::Sender<Event>, events: Vec<Event>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        for event in events {
            time::sleep(period).await;
            if tx.send(event).await.is_err() {
                break;
            }
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_free_run_pipeline_is_paced() {
    println!("📈 Testing free-run pipeline...");
    let (tx, rx) = mpsc::channel(4);

    let mut events = Vec::new();
    for block in 0..4u16 {
        events.push(Event::Conversions((0..64).map(|i| block * 64 + i).collect()));
        events.push(Event::ShadowTick);
    }
    let producer = spawn_producer(tx, events, Duration::from_millis(1));

    let start = Instant::now();
    let mut fg = Foreground::new();
    fg.run(rx).await;
    producer.await.unwrap();

    // Each 64-sample block releases only what it stored, whatever the shadow says
    let cursors: Vec<u16> = fg.streamed.iter().map(|f| f.adc_cursor).collect();
    assert_eq!(cursors.len(), CAP / BATCH_LEN);
    assert!(cursors.iter().copied().eq((0..CAP as u16).step_by(BATCH_LEN)));
    for frame in &fg.streamed {
        assert_eq!(frame.ch0[0], frame.adc_cursor);
    }
    assert!(fg.streamed.iter().all(|f| f.logic_cursor == NO_DATA_CURSOR));
    // The last poll found the cursor at capacity and restarted
    assert_eq!(fg.inst.acquisition().cursor(), 0);

    assert!(start.elapsed() >= PACE * cursors.len() as u32);
    assert_eq!(fg.scheduler.stats().sent as usize, cursors.len());
    println!("  ✅ {} frames in {:?}", cursors.len(), start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_logic_capture_through_host_command() {
    println!("🔌 Testing logic capture pipeline...");
    let (tx, rx) = mpsc::channel(4);
    let events = vec![
        Event::Host(frames::logic_start(0x0001, 1)),
        Event::LogicSample(0),
        Event::LogicSample(1),
        Event::LogicSample(1),
        Event::LogicSample(0),
        Event::ConfirmationElapsed,
    ];
    let producer = spawn_producer(tx, events, Duration::from_micros(500));

    let mut fg = Foreground::new();
    fg.run(rx).await;
    producer.await.unwrap();

    assert_eq!(fg.hal.transport.acks, 1);
    assert_eq!(fg.streamed.len(), CAP / BATCH_LEN);
    assert_eq!(&fg.streamed[0].logic[..4], &[0, 1, 1, 0]);
    assert!(fg.streamed.iter().all(|f| f.adc_cursor == NO_DATA_CURSOR));
    assert_eq!(fg.inst.logic().state(), CaptureState::PreTrigger);
    assert_eq!(fg.hal.logic.sampling_starts, 2);
    println!("  ✅ Logic capture streamed and re-armed");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sources_share_frames() {
    println!("🔀 Testing concurrent analog and logic producers...");
    let (tx, rx) = mpsc::channel(4);

    let analog = vec![
        Event::Conversions((0..CAP as u16).collect()),
        Event::ShadowTick,
        Event::ShadowTick,
        Event::ShadowTick,
    ];
    let mut logic = vec![Event::Host(frames::logic_start(0x0002, 1))];
    logic.extend([0u16, 2, 2, 0].into_iter().map(Event::LogicSample));
    logic.push(Event::ConfirmationElapsed);

    let analog_task = spawn_producer(tx.clone(), analog, Duration::from_micros(700));
    let logic_task = spawn_producer(tx, logic, Duration::from_micros(300));

    let mut fg = Foreground::new();
    fg.run(rx).await;
    analog_task.await.unwrap();
    logic_task.await.unwrap();

    let analog_frames = fg.streamed.iter().filter(|f| f.has_analog()).count();
    let logic_frames = fg.streamed.iter().filter(|f| f.has_logic()).count();
    assert_eq!(analog_frames, CAP / BATCH_LEN);
    assert_eq!(logic_frames, CAP / BATCH_LEN);

    let stats = *fg.scheduler.stats();
    assert_eq!(
        (stats.interleaved + stats.analog_only + stats.logic_only) as usize,
        fg.streamed.len()
    );
    assert_eq!(stats.dropped, 0);
    println!("  ✅ {} frames, {} interleaved", fg.streamed.len(), stats.interleaved);
}

#[tokio::test(start_paused = true)]
async fn test_slow_host_loses_frames_not_commands() {
    let (tx, rx) = mpsc::channel(4);
    let events = vec![
        Event::Conversions(vec![0; 128]),
        Event::ShadowTick,
        Event::Host(frames::adc_free_run(6)),
    ];
    let producer = spawn_producer(tx, events, Duration::from_millis(2));

    let mut fg = Foreground::new();
    fg.hal.transport.set_busy(true);
    fg.run(rx).await;
    producer.await.unwrap();

    assert_eq!(fg.scheduler.stats().dropped, 13);
    assert_eq!(fg.scheduler.stats().sent, 0);
    assert_eq!(fg.hal.digitizer.rate, Some(SampleRate::from_mode(6)));
    assert_eq!(fg.inst.acquisition().cursor(), 0);
}

#[test]
fn test_commands_acknowledged_in_order() {
    tokio_test::block_on(async {
        let (tx, rx) = mpsc::channel(8);
        for raw in [frames::handshake(), frames::adc_free_run(4), frames::logic_stop()] {
            tx.send(Event::Host(raw)).await.unwrap();
        }
        drop(tx);

        let mut fg = Foreground::new();
        fg.run(rx).await;

        assert_eq!(HostLink::drain(&fg.hal.transport), vec![HostMessage::Ack; 3]);
        assert_eq!(fg.hal.digitizer.rate, Some(SampleRate::from_mode(4)));
        assert!(fg.streamed.is_empty());
    });
}
