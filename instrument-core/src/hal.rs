//! Hardware Abstraction Layer for the instrument
//!
//! Each trait covers one peripheral group the engines drive. The board
//! bundles them behind [`InstrumentHal`].

use embedded_hal::digital::OutputPin;

use crate::types::{
    AnalogChannel, AwgChannel, AwgChannelConfig, FrontEndFlags, LogicTiming, SampleRate,
    SampleTime, WatchdogBands,
};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Transmit path still holds the previous frame
    TransportBusy,
    /// GPIO operation failed
    GpioError,
    /// Peripheral did not come up
    PeripheralInit,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::TransportBusy => write!(f, "Transport busy"),
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::PeripheralInit => write!(f, "Peripheral initialization failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Bulk transmit path to the host
pub trait Transport {
    /// Queue one frame. Returns `TransportBusy` instead of waiting.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), HalError>;
}

/// Analog front-end switches
pub trait FrontEnd {
    /// Drive the six control lines of one channel
    fn apply(&mut self, channel: AnalogChannel, flags: &FrontEndFlags) -> Result<(), HalError>;
}

/// Dual-channel converter with its shadow timer and analog watchdogs
pub trait Digitizer {
    /// Stop conversions, DMA and the shadow timer
    fn stop_conversion(&mut self) -> Result<(), HalError>;

    /// Start conversions from the beginning of the capture buffers
    fn start_conversion(&mut self) -> Result<(), HalError>;

    /// Program the conversion and shadow timers
    fn configure_rate(&mut self, rate: &SampleRate) -> Result<(), HalError>;

    fn set_sample_time(&mut self, sample_time: SampleTime) -> Result<(), HalError>;

    /// Program both watchdog bands on `channel` and enable their interrupts
    fn arm_watchdogs(
        &mut self,
        channel: AnalogChannel,
        bands: &WatchdogBands,
    ) -> Result<(), HalError>;

    fn disarm_watchdogs(&mut self) -> Result<(), HalError>;

    /// Pass conversions written since the last delivered block to `sink`.
    /// Only valid after `stop_conversion`.
    fn drain_pending<F: FnMut(&[u16], &[u16])>(&mut self, sink: F) -> Result<(), HalError>;
}

/// Parallel port sampler and its confirmation timer
pub trait LogicPort {
    fn configure(&mut self, timing: &LogicTiming) -> Result<(), HalError>;

    fn start_sampling(&mut self) -> Result<(), HalError>;

    fn stop_sampling(&mut self) -> Result<(), HalError>;

    /// Start the post-trigger confirmation countdown
    fn start_confirmation(&mut self) -> Result<(), HalError>;

    fn stop_confirmation(&mut self) -> Result<(), HalError>;
}

/// Two DAC channels clocked by their own sample timers
pub trait WaveformTimers {
    /// Program prescaler, period and offset compare of one channel
    fn program(&mut self, channel: AwgChannel, config: &AwgChannelConfig) -> Result<(), HalError>;

    fn set_gain(&mut self, channel: AwgChannel, gain: u8) -> Result<(), HalError>;

    /// Disable both sample timers
    fn halt(&mut self) -> Result<(), HalError>;

    /// Restart the channel's DMA from the start of `table`
    fn restart_dma(&mut self, channel: AwgChannel, table: &[u16]) -> Result<(), HalError>;

    /// Force an update event on both timers, preset their counters and
    /// enable them back-to-back
    fn commit(&mut self, presets: [u16; 2]) -> Result<(), HalError>;
}

/// Complete instrument HAL interface
pub trait InstrumentHal {
    type Transport: Transport;
    type FrontEnd: FrontEnd;
    type Digitizer: Digitizer;
    type LogicPort: LogicPort;
    type Waveform: WaveformTimers;

    /// Initialize hardware
    fn initialize(&mut self) -> Result<(), HalError>;

    fn transport(&mut self) -> &mut Self::Transport;

    fn front_end(&mut self) -> &mut Self::FrontEnd;

    fn digitizer(&mut self) -> &mut Self::Digitizer;

    fn logic_port(&mut self) -> &mut Self::LogicPort;

    fn waveform(&mut self) -> &mut Self::Waveform;

    /// Shutdown hardware
    fn shutdown(&mut self) -> Result<(), HalError>;
}

/// Front-end driven through embedded-hal output pins
///
/// Pins are in wiring order: offset, attenuation, x10, x5, x2.5, x1.
pub struct EmbeddedHalFrontEnd<P> {
    channels: [[P; 6]; 2],
}

impl<P> EmbeddedHalFrontEnd<P>
where
    P: OutputPin,
{
    pub const fn new(ch0: [P; 6], ch1: [P; 6]) -> Self {
        Self {
            channels: [ch0, ch1],
        }
    }

    /// Give the pins back
    pub fn release(self) -> ([P; 6], [P; 6]) {
        let [ch0, ch1] = self.channels;
        (ch0, ch1)
    }
}

impl<P> FrontEnd for EmbeddedHalFrontEnd<P>
where
    P: OutputPin,
{
    fn apply(&mut self, channel: AnalogChannel, flags: &FrontEndFlags) -> Result<(), HalError> {
        let pins = &mut self.channels[channel.index()];
        for (pin, level) in pins.iter_mut().zip(flags.levels()) {
            let result = if level { pin.set_high() } else { pin.set_low() };
            result.map_err(|_| HalError::GpioError)?;
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use crate::protocol::{RawFrame, FRAME_LEN, TAG_ACK, TAG_SAMPLES};
    use heapless::{Deque, Vec};

    /// Frames kept by [`MockTransport`]
    pub const TRANSPORT_LOG_LEN: usize = 32;

    /// One transmitted buffer, zero-extended to a frame
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SentFrame {
        pub bytes: RawFrame,
        pub len: usize,
    }

    impl SentFrame {
        pub fn payload(&self) -> &[u8] {
            &self.bytes[..self.len]
        }
    }

    /// Records what the device sent, keeping the most recent frames
    #[derive(Default)]
    pub struct MockTransport {
        log: Deque<SentFrame, TRANSPORT_LOG_LEN>,
        busy: bool,
        pub transmitted: u32,
        pub refused: u32,
        pub acks: u32,
        pub sample_frames: u32,
        pub rejections: u32,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following transmit fail with `TransportBusy`
        pub fn set_busy(&mut self, busy: bool) {
            self.busy = busy;
        }

        pub fn last(&self) -> Option<&SentFrame> {
            self.log.back()
        }

        pub fn sent(&self) -> impl Iterator<Item = &SentFrame> {
            self.log.iter()
        }

        pub fn clear(&mut self) {
            self.log.clear();
            self.transmitted = 0;
            self.refused = 0;
            self.acks = 0;
            self.sample_frames = 0;
            self.rejections = 0;
        }
    }

    impl Transport for MockTransport {
        fn transmit(&mut self, bytes: &[u8]) -> Result<(), HalError> {
            if self.busy {
                self.refused += 1;
                return Err(HalError::TransportBusy);
            }
            if bytes.len() > FRAME_LEN {
                return Err(HalError::InvalidConfig);
            }

            let mut frame = SentFrame {
                bytes: [0; FRAME_LEN],
                len: bytes.len(),
            };
            frame.bytes[..bytes.len()].copy_from_slice(bytes);

            if bytes.len() == FRAME_LEN && bytes[0] == TAG_ACK {
                self.acks += 1;
            } else if bytes.len() == FRAME_LEN && bytes[0] == TAG_SAMPLES {
                self.sample_frames += 1;
            } else {
                self.rejections += 1;
            }

            if self.log.is_full() {
                self.log.pop_front();
            }
            let _ = self.log.push_back(frame);
            self.transmitted += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockFrontEnd {
        pub applied: [Option<FrontEndFlags>; 2],
        pub writes: u32,
    }

    impl MockFrontEnd {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl FrontEnd for MockFrontEnd {
        fn apply(&mut self, channel: AnalogChannel, flags: &FrontEndFlags) -> Result<(), HalError> {
            self.applied[channel.index()] = Some(*flags);
            self.writes += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockDigitizer {
        pub running: bool,
        pub starts: u32,
        pub stops: u32,
        pub rate: Option<SampleRate>,
        pub sample_time: Option<SampleTime>,
        pub armed: Option<(AnalogChannel, WatchdogBands)>,
        /// Conversions still in staging, handed over by `drain_pending`
        pub pending_ch0: Vec<u16, 64>,
        pub pending_ch1: Vec<u16, 64>,
    }

    impl MockDigitizer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Leave conversions in staging, as a DMA stopped mid-block does
        pub fn stage(&mut self, ch0: &[u16], ch1: &[u16]) {
            let _ = self.pending_ch0.extend_from_slice(ch0);
            let _ = self.pending_ch1.extend_from_slice(ch1);
        }
    }

    impl Digitizer for MockDigitizer {
        fn stop_conversion(&mut self) -> Result<(), HalError> {
            self.running = false;
            self.stops += 1;
            Ok(())
        }

        fn start_conversion(&mut self) -> Result<(), HalError> {
            self.running = true;
            self.starts += 1;
            Ok(())
        }

        fn configure_rate(&mut self, rate: &SampleRate) -> Result<(), HalError> {
            self.rate = Some(*rate);
            Ok(())
        }

        fn set_sample_time(&mut self, sample_time: SampleTime) -> Result<(), HalError> {
            self.sample_time = Some(sample_time);
            Ok(())
        }

        fn arm_watchdogs(
            &mut self,
            channel: AnalogChannel,
            bands: &WatchdogBands,
        ) -> Result<(), HalError> {
            self.armed = Some((channel, *bands));
            Ok(())
        }

        fn disarm_watchdogs(&mut self) -> Result<(), HalError> {
            self.armed = None;
            Ok(())
        }

        fn drain_pending<F: FnMut(&[u16], &[u16])>(&mut self, mut sink: F) -> Result<(), HalError> {
            if !self.pending_ch0.is_empty() {
                sink(&self.pending_ch0, &self.pending_ch1);
            }
            self.pending_ch0.clear();
            self.pending_ch1.clear();
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockLogicPort {
        pub sampling: bool,
        pub confirming: bool,
        pub sampling_starts: u32,
        pub timing: Option<LogicTiming>,
    }

    impl MockLogicPort {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl LogicPort for MockLogicPort {
        fn configure(&mut self, timing: &LogicTiming) -> Result<(), HalError> {
            self.timing = Some(*timing);
            Ok(())
        }

        fn start_sampling(&mut self) -> Result<(), HalError> {
            self.sampling = true;
            self.sampling_starts += 1;
            Ok(())
        }

        fn stop_sampling(&mut self) -> Result<(), HalError> {
            self.sampling = false;
            Ok(())
        }

        fn start_confirmation(&mut self) -> Result<(), HalError> {
            self.confirming = true;
            Ok(())
        }

        fn stop_confirmation(&mut self) -> Result<(), HalError> {
            self.confirming = false;
            Ok(())
        }
    }

    /// Generator operation as seen by the timers
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum WaveformOp {
        Program(AwgChannel, AwgChannelConfig),
        Gain(AwgChannel, u8),
        Halt,
        RestartDma(AwgChannel, usize),
        Commit([u16; 2]),
    }

    #[derive(Default)]
    pub struct MockWaveform {
        pub ops: Vec<WaveformOp, 32>,
        pub running: bool,
        /// First sample of each table at the last DMA restart
        pub table_heads: [Option<u16>; 2],
    }

    impl MockWaveform {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn clear_ops(&mut self) {
            self.ops.clear();
        }

        fn record(&mut self, op: WaveformOp) {
            let _ = self.ops.push(op);
        }
    }

    impl WaveformTimers for MockWaveform {
        fn program(&mut self, channel: AwgChannel, config: &AwgChannelConfig) -> Result<(), HalError> {
            self.record(WaveformOp::Program(channel, *config));
            Ok(())
        }

        fn set_gain(&mut self, channel: AwgChannel, gain: u8) -> Result<(), HalError> {
            self.record(WaveformOp::Gain(channel, gain));
            Ok(())
        }

        fn halt(&mut self) -> Result<(), HalError> {
            self.running = false;
            self.record(WaveformOp::Halt);
            Ok(())
        }

        fn restart_dma(&mut self, channel: AwgChannel, table: &[u16]) -> Result<(), HalError> {
            self.table_heads[channel.index()] = table.first().copied();
            self.record(WaveformOp::RestartDma(channel, table.len()));
            Ok(())
        }

        fn commit(&mut self, presets: [u16; 2]) -> Result<(), HalError> {
            self.running = true;
            self.record(WaveformOp::Commit(presets));
            Ok(())
        }
    }

    /// Whole-board mock
    #[derive(Default)]
    pub struct MockInstrumentHal {
        pub transport: MockTransport,
        pub front_end: MockFrontEnd,
        pub digitizer: MockDigitizer,
        pub logic: MockLogicPort,
        pub waveform: MockWaveform,
        pub initialized: bool,
        /// Make `initialize` fail, to exercise the fatal path
        pub fail_init: bool,
    }

    impl MockInstrumentHal {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl InstrumentHal for MockInstrumentHal {
        type Transport = MockTransport;
        type FrontEnd = MockFrontEnd;
        type Digitizer = MockDigitizer;
        type LogicPort = MockLogicPort;
        type Waveform = MockWaveform;

        fn initialize(&mut self) -> Result<(), HalError> {
            if self.fail_init {
                return Err(HalError::PeripheralInit);
            }
            self.initialized = true;
            Ok(())
        }

        fn transport(&mut self) -> &mut Self::Transport {
            &mut self.transport
        }

        fn front_end(&mut self) -> &mut Self::FrontEnd {
            &mut self.front_end
        }

        fn digitizer(&mut self) -> &mut Self::Digitizer {
            &mut self.digitizer
        }

        fn logic_port(&mut self) -> &mut Self::LogicPort {
            &mut self.logic
        }

        fn waveform(&mut self) -> &mut Self::Waveform {
            &mut self.waveform
        }

        fn shutdown(&mut self) -> Result<(), HalError> {
            self.initialized = false;
            Ok(())
        }
    }
}
