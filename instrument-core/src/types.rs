//! Core data types for the instrument

/// Samples held per analog channel ring
pub const ADC_BUFFER_LEN: usize = 30_000;

/// Samples held by the logic channel ring
pub const LOGIC_BUFFER_LEN: usize = 30_000;

/// Samples carried per channel in one sample frame
pub const BATCH_LEN: usize = 8;

/// Cursor value meaning "no data for this channel in this frame"
pub const NO_DATA_CURSOR: u16 = 40_000;

/// Shadow counter advance per shadow timer tick
pub const SHADOW_STEP: u16 = 100;

/// Default post-trigger capture length, in shadow counter units
pub const POST_TRIGGER_DEFAULT: u16 = 100;

/// Samples per generator lookup table
pub const AWG_TABLE_LEN: usize = 4096;

/// Full scale of the 12-bit converter
pub const ADC_FULL_SCALE: u16 = 0x0FFF;

/// Capture state shared by the acquisition and logic engines
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureState {
    /// Free-running, every captured batch is streamed
    NoTrigger,
    /// Armed and waiting for a qualifying edge; nothing is streamed
    PreTrigger,
    /// Edge seen, still capturing the post-trigger window
    TriggerState,
    /// Capture frozen, buffer being streamed to the host
    PostTrigger,
}

impl CaptureState {
    /// Returns true if data from this state may be streamed
    pub const fn streams(&self) -> bool {
        match self {
            CaptureState::NoTrigger | CaptureState::PostTrigger => true,
            CaptureState::PreTrigger | CaptureState::TriggerState => false,
        }
    }
}

/// Analog trigger mode as carried by the `AdcSet` command
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    /// No trigger, sample and send
    Free,
    /// Trigger on a crossing from below
    RisingEdge,
    /// Trigger on a crossing from above
    FallingEdge,
}

impl TriggerMode {
    /// Decode the wire value. Unknown values fall back to free-running.
    pub const fn from_wire(value: u8) -> Self {
        match value {
            1 => TriggerMode::RisingEdge,
            2 => TriggerMode::FallingEdge,
            _ => TriggerMode::Free,
        }
    }

    pub const fn to_wire(&self) -> u8 {
        match self {
            TriggerMode::Free => 0,
            TriggerMode::RisingEdge => 1,
            TriggerMode::FallingEdge => 2,
        }
    }
}

/// Analog input channel of the oscilloscope
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogChannel {
    Ch0,
    Ch1,
}

impl AnalogChannel {
    /// Strict decode, `None` for anything but 0 or 1
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(AnalogChannel::Ch0),
            1 => Some(AnalogChannel::Ch1),
            _ => None,
        }
    }

    /// Lenient decode used for engines: anything but 0 selects channel 1
    pub const fn from_wire_lossy(value: u8) -> Self {
        match value {
            0 => AnalogChannel::Ch0,
            _ => AnalogChannel::Ch1,
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            AnalogChannel::Ch0 => 0,
            AnalogChannel::Ch1 => 1,
        }
    }
}

/// Generator output channel
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AwgChannel {
    Out0,
    Out1,
}

impl AwgChannel {
    /// Anything but 0 selects output 1
    pub const fn from_wire_lossy(value: u8) -> Self {
        match value {
            0 => AwgChannel::Out0,
            _ => AwgChannel::Out1,
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            AwgChannel::Out0 => 0,
            AwgChannel::Out1 => 1,
        }
    }

    /// The channel whose period enters this channel's phase preset
    pub const fn other(&self) -> AwgChannel {
        match self {
            AwgChannel::Out0 => AwgChannel::Out1,
            AwgChannel::Out1 => AwgChannel::Out0,
        }
    }
}

/// Edge the logic engine triggers on
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogicEdge {
    Falling,
    Rising,
}

impl LogicEdge {
    /// Zero selects a falling edge, anything else a rising edge
    pub const fn from_wire(value: u16) -> Self {
        if value == 0 {
            LogicEdge::Falling
        } else {
            LogicEdge::Rising
        }
    }

    pub const fn to_wire(&self) -> u16 {
        match self {
            LogicEdge::Falling => 0,
            LogicEdge::Rising => 1,
        }
    }

    /// Returns true if `previous -> current` is this edge on any pin in `mask`
    pub const fn detect(&self, previous: u16, current: u16, mask: u16) -> bool {
        let was_high = previous & mask != 0;
        let is_high = current & mask != 0;
        match self {
            LogicEdge::Falling => was_high && !is_high,
            LogicEdge::Rising => !was_high && is_high,
        }
    }
}

/// Inclusive threshold window of an analog watchdog
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Band {
    pub low: u16,
    pub high: u16,
}

impl Band {
    pub const fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    pub const fn contains(&self, sample: u16) -> bool {
        sample >= self.low && sample <= self.high
    }
}

/// Which of the two watchdog stages fired
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BandHit {
    /// Coarse stage, arms the confirmation
    Far,
    /// Fine stage around the trigger level
    Near,
}

/// Band margins around the trigger level, in converter counts.
///
/// These were tuned on the bench and should be re-verified against hardware.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchdogCalibration {
    /// Half width of the near band
    pub near: u16,
    /// Distance from the level to the inner edge of the far band
    pub far_inner: u16,
    /// Distance from the level to the outer edge of the far band
    pub far_outer: u16,
}

impl WatchdogCalibration {
    pub const DEFAULT: Self = Self {
        near: 15,
        far_inner: 35,
        far_outer: 65,
    };

    /// Compute both bands for a level and edge direction
    pub const fn bands(&self, level: u16, mode: TriggerMode) -> WatchdogBands {
        let near = Band::new(level.saturating_sub(self.near), level.saturating_add(self.near));
        let far = match mode {
            TriggerMode::FallingEdge => Band::new(
                level.saturating_add(self.far_inner),
                level.saturating_add(self.far_outer),
            ),
            TriggerMode::RisingEdge | TriggerMode::Free => Band::new(
                level.saturating_sub(self.far_outer),
                level.saturating_sub(self.far_inner),
            ),
        };
        WatchdogBands { far, near }
    }
}

impl Default for WatchdogCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The two-stage threshold pair programmed into the analog watchdogs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchdogBands {
    pub far: Band,
    pub near: Band,
}

impl WatchdogBands {
    /// Which band, if any, a conversion result falls into
    pub const fn classify(&self, sample: u16) -> Option<BandHit> {
        if self.near.contains(sample) {
            Some(BandHit::Near)
        } else if self.far.contains(sample) {
            Some(BandHit::Far)
        } else {
            None
        }
    }
}

/// Analog trigger configuration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub level: u16,
    /// Post-trigger capture length, in shadow counter units
    pub post_trigger: u16,
    pub channel: AnalogChannel,
}

impl TriggerConfig {
    pub const DEFAULT: Self = Self {
        mode: TriggerMode::Free,
        level: 0,
        post_trigger: POST_TRIGGER_DEFAULT,
        channel: AnalogChannel::Ch0,
    };
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Converter sampling time, in ADC clock cycles
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleTime {
    Cycles2_5,
    Cycles6_5,
    Cycles12_5,
    Cycles24_5,
    Cycles47_5,
    Cycles92_5,
    Cycles247_5,
    Cycles640_5,
}

impl SampleTime {
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(SampleTime::Cycles2_5),
            1 => Some(SampleTime::Cycles6_5),
            2 => Some(SampleTime::Cycles12_5),
            3 => Some(SampleTime::Cycles24_5),
            4 => Some(SampleTime::Cycles47_5),
            5 => Some(SampleTime::Cycles92_5),
            6 => Some(SampleTime::Cycles247_5),
            7 => Some(SampleTime::Cycles640_5),
            _ => None,
        }
    }

    /// Register encoding (SMPx field)
    pub const fn code(&self) -> u8 {
        *self as u8
    }
}

/// Conversion and shadow timer settings for one sample rate
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleRate {
    /// Nominal conversion rate in Hz
    pub hz: u32,
    pub conversion_prescaler: u16,
    pub conversion_period: u16,
    pub shadow_prescaler: u16,
    pub shadow_period: u16,
    /// Sampling time paired with this rate
    pub sample_time: SampleTime,
}

impl SampleRate {
    const fn preset(hz: u32, conversion: u16, shadow: u16, sample_time: SampleTime) -> Self {
        Self {
            hz,
            conversion_prescaler: 25 - 1,
            conversion_period: conversion - 1,
            shadow_prescaler: 500 - 1,
            shadow_period: shadow - 1,
            sample_time,
        }
    }

    /// Decode the `AdcSet` mode byte. Unknown modes select 5 MHz.
    pub const fn from_mode(mode: u8) -> Self {
        use SampleTime::*;
        match mode {
            1 => Self::preset(2_000_000, 5, 25, Cycles2_5),
            2 => Self::preset(1_000_000, 10, 50, Cycles12_5),
            3 => Self::preset(500_000, 20, 100, Cycles47_5),
            4 => Self::preset(200_000, 50, 250, Cycles92_5),
            5 => Self::preset(100_000, 100, 500, Cycles247_5),
            6 => Self::preset(50_000, 200, 1000, Cycles640_5),
            7 => Self::preset(20_000, 500, 2500, Cycles640_5),
            8 => Self::preset(10_000, 1000, 5000, Cycles640_5),
            9 => Self::preset(5_000, 2000, 10000, Cycles640_5),
            10 => Self::preset(2_000, 5000, 25000, Cycles640_5),
            11 => Self::preset(1_000, 10000, 50000, Cycles640_5),
            _ => Self::preset(5_000_000, 2, 10, Cycles2_5),
        }
    }
}

/// Analog front-end switch states for one channel
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrontEndFlags {
    /// AC/DC coupling offset
    pub offset: bool,
    pub attenuation: bool,
    pub amp10: bool,
    pub amp5: bool,
    pub amp2_5: bool,
    pub amp1: bool,
}

impl FrontEndFlags {
    /// Line levels in board wiring order
    pub const fn levels(&self) -> [bool; 6] {
        [self.offset, self.attenuation, self.amp10, self.amp5, self.amp2_5, self.amp1]
    }
}

/// Per-channel generator timer configuration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AwgChannelConfig {
    pub prescaler: u16,
    /// Auto-reload value of the sample clock timer
    pub period: u16,
    /// Compare value of the output offset PWM
    pub compare_offset: u16,
    pub sample_count: u16,
    pub phase_offset: u16,
    /// Output gain stage selector
    pub gain: u8,
}

impl AwgChannelConfig {
    /// Idle generator: two-sample table, mid-scale offset
    pub const DEFAULT: Self = Self {
        prescaler: 0,
        period: 0,
        compare_offset: 2048,
        sample_count: 2,
        phase_offset: 0,
        gain: 0,
    };
}

impl Default for AwgChannelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Logic analyzer timer periods
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicTiming {
    /// Confirmation timer period
    pub period16: u16,
    /// Confirmation timer prescaler
    pub prescaler16: u16,
    /// Sampling timer period
    pub period32: u32,
}

impl LogicTiming {
    pub const DEFAULT: Self = Self {
        period16: 0xFFFF,
        prescaler16: 1,
        period32: 0x0000_8CA0,
    };
}

impl Default for LogicTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Instrument configuration parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstrumentConfig {
    /// Post-trigger capture length, in shadow counter units
    pub post_trigger: u16,
    /// Shadow counter advance per shadow tick
    pub shadow_step: u16,
    /// Analog watchdog band margins
    pub watchdog: WatchdogCalibration,
    /// Pause after each streamed frame, in microseconds
    pub stream_pace_us: u32,
}

impl InstrumentConfig {
    pub const DEFAULT: Self = Self {
        post_trigger: POST_TRIGGER_DEFAULT,
        shadow_step: SHADOW_STEP,
        watchdog: WatchdogCalibration::DEFAULT,
        stream_pace_us: 150,
    };

    /// Create a new configuration with validation
    pub fn new(
        post_trigger: u16,
        shadow_step: u16,
        watchdog: WatchdogCalibration,
        stream_pace_us: u32,
    ) -> Result<Self, &'static str> {
        if shadow_step == 0 {
            return Err("Shadow step must be non-zero");
        }
        if post_trigger as usize > ADC_BUFFER_LEN {
            return Err("Post-trigger window must fit in the capture buffer");
        }
        if watchdog.far_inner <= watchdog.near {
            return Err("Far band must lie outside the near band");
        }
        if watchdog.far_outer <= watchdog.far_inner {
            return Err("Far band must have non-zero width");
        }
        if stream_pace_us > 10_000 {
            return Err("Stream pacing must be <= 10ms");
        }

        Ok(Self {
            post_trigger,
            shadow_step,
            watchdog,
            stream_pace_us,
        })
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
