//! Analog acquisition and trigger state machine

use crate::hal::{Digitizer, HalError};
use crate::protocol::AdcSetCommand;
use crate::ring::SampleRing;
use crate::types::{
    AnalogChannel, BandHit, CaptureState, InstrumentConfig, SampleRate, SampleTime,
    TriggerConfig, TriggerMode, WatchdogBands, WatchdogCalibration, BATCH_LEN,
};

/// Oscilloscope capture engine for both analog channels
///
/// Conversion results land in two rings of `N` samples. The shadow counter,
/// advanced by a periodic timer, bounds how far the rings are safe to read,
/// and never past the samples actually stored since the last restart.
pub struct AcquisitionEngine<const N: usize> {
    ch0: SampleRing<N>,
    ch1: SampleRing<N>,
    state: CaptureState,
    trigger: TriggerConfig,
    calibration: WatchdogCalibration,
    shadow_step: u16,
    bands: WatchdogBands,
    cursor: u16,
    shadow: u16,
    filled: u16,
    far_seen: bool,
}

impl<const N: usize> AcquisitionEngine<N> {
    const CAPACITY: u16 = if N > u16::MAX as usize { u16::MAX } else { N as u16 };

    pub const fn new(config: &InstrumentConfig) -> Self {
        let trigger = TriggerConfig {
            post_trigger: config.post_trigger,
            ..TriggerConfig::DEFAULT
        };
        Self {
            ch0: SampleRing::new(),
            ch1: SampleRing::new(),
            state: CaptureState::NoTrigger,
            bands: config.watchdog.bands(trigger.level, trigger.mode),
            trigger,
            calibration: config.watchdog,
            shadow_step: config.shadow_step,
            cursor: 0,
            shadow: 0,
            filled: 0,
            far_seen: false,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }

    pub fn bands(&self) -> &WatchdogBands {
        &self.bands
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn shadow(&self) -> u16 {
        self.shadow
    }

    /// Samples stored per channel since the last restart, capped at capacity
    pub fn filled(&self) -> u16 {
        self.filled
    }

    /// True once the far band has been entered in this arming
    pub fn far_seen(&self) -> bool {
        self.far_seen
    }

    pub fn channel(&self, channel: AnalogChannel) -> &SampleRing<N> {
        match channel {
            AnalogChannel::Ch0 => &self.ch0,
            AnalogChannel::Ch1 => &self.ch1,
        }
    }

    /// Start free-running with the current rate settings
    pub fn boot<D: Digitizer>(&mut self, hw: &mut D) -> Result<(), HalError> {
        self.state = CaptureState::NoTrigger;
        hw.disarm_watchdogs()?;
        self.restart(hw)
    }

    /// Apply an `AdcSet` command. Any capture in progress is discarded.
    pub fn configure<D: Digitizer>(
        &mut self,
        cmd: &AdcSetCommand,
        hw: &mut D,
    ) -> Result<(), HalError> {
        hw.stop_conversion()?;

        let rate = SampleRate::from_mode(cmd.mode);
        hw.configure_rate(&rate)?;
        hw.set_sample_time(SampleTime::from_wire(cmd.sample_time).unwrap_or(rate.sample_time))?;

        self.trigger.mode = TriggerMode::from_wire(cmd.trigger_mode);
        self.trigger.level = cmd.trigger_level;
        self.trigger.channel = AnalogChannel::from_wire_lossy(cmd.channel);
        self.bands = self.calibration.bands(self.trigger.level, self.trigger.mode);

        self.state = match self.trigger.mode {
            TriggerMode::Free => {
                hw.disarm_watchdogs()?;
                CaptureState::NoTrigger
            }
            TriggerMode::RisingEdge | TriggerMode::FallingEdge => {
                hw.arm_watchdogs(self.trigger.channel, &self.bands)?;
                CaptureState::PreTrigger
            }
        };

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "📈 ADC: {} Hz, trigger {} at {} on {}",
            rate.hz,
            self.trigger.mode,
            self.trigger.level,
            self.trigger.channel
        );

        self.restart(hw)
    }

    fn restart<D: Digitizer>(&mut self, hw: &mut D) -> Result<(), HalError> {
        self.cursor = 0;
        self.shadow = 0;
        self.filled = 0;
        self.far_seen = false;
        self.ch0.reset_write();
        self.ch1.reset_write();
        hw.start_conversion()
    }

    /// Shadow timer elapsed
    pub fn on_shadow_tick(&mut self) {
        self.shadow = self.shadow.saturating_add(self.shadow_step).min(Self::CAPACITY);
    }

    /// Store one conversion pair
    #[inline]
    pub fn on_conversion(&mut self, ch0: u16, ch1: u16) {
        self.ch0.push(ch0);
        self.ch1.push(ch1);
        self.count_stored(1);
    }

    /// Store a block of conversion pairs, as delivered by a DMA half transfer
    pub fn on_conversions(&mut self, ch0: &[u16], ch1: &[u16]) {
        self.ch0.extend_from_slice(ch0);
        self.ch1.extend_from_slice(ch1);
        self.count_stored(ch0.len().min(ch1.len()));
    }

    fn count_stored(&mut self, samples: usize) {
        let samples = samples.min(Self::CAPACITY as usize) as u16;
        self.filled = self.filled.saturating_add(samples).min(Self::CAPACITY);
    }

    /// Safe read bound in free-run
    fn readable(&self) -> u16 {
        self.shadow.min(self.filled)
    }

    /// Channel and bands the watchdogs currently compare against
    pub fn armed_watch(&self) -> Option<(AnalogChannel, WatchdogBands)> {
        if self.state == CaptureState::PreTrigger {
            Some((self.trigger.channel, self.bands))
        } else {
            None
        }
    }

    /// Analog watchdog interrupt
    ///
    /// A near hit only counts once the far band has been crossed, so noise
    /// around the level alone does not trigger.
    pub fn on_watchdog<D: Digitizer>(&mut self, hit: BandHit, hw: &mut D) -> Result<(), HalError> {
        if self.state != CaptureState::PreTrigger {
            return Ok(());
        }
        match hit {
            BandHit::Far => {
                self.far_seen = true;
            }
            BandHit::Near if self.far_seen => {
                hw.disarm_watchdogs()?;
                self.far_seen = false;
                self.cursor = 0;
                self.shadow = 0;
                self.state = CaptureState::TriggerState;
                #[cfg(feature = "defmt")]
                defmt::info!("🎯 Analog trigger at level {}", self.trigger.level);
            }
            BandHit::Near => {}
        }
        Ok(())
    }

    /// Advance the state machine and report whether a batch is ready
    pub fn poll<D: Digitizer>(&mut self, hw: &mut D) -> Result<bool, HalError> {
        match self.state {
            CaptureState::NoTrigger => {
                if self.cursor >= Self::CAPACITY {
                    self.restart(hw)?;
                }
                Ok(self.readable() > self.cursor)
            }
            CaptureState::PreTrigger => Ok(false),
            CaptureState::TriggerState => {
                if self.shadow < self.trigger.post_trigger {
                    return Ok(false);
                }
                hw.stop_conversion()?;
                hw.drain_pending(|ch0, ch1| self.on_conversions(ch0, ch1))?;
                self.state = CaptureState::PostTrigger;
                #[cfg(feature = "defmt")]
                defmt::debug!("📦 Analog capture frozen");
                Ok(self.cursor < Self::CAPACITY)
            }
            CaptureState::PostTrigger => {
                if self.cursor < Self::CAPACITY {
                    return Ok(true);
                }
                hw.arm_watchdogs(self.trigger.channel, &self.bands)?;
                self.state = CaptureState::PreTrigger;
                self.restart(hw)?;
                Ok(false)
            }
        }
    }

    /// Both channels' batch at the read cursor
    pub fn batch(&self) -> ([u16; BATCH_LEN], [u16; BATCH_LEN]) {
        (self.ch0.batch(self.cursor), self.ch1.batch(self.cursor))
    }

    /// Move the read cursor past the batch just streamed
    pub fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(BATCH_LEN as u16);
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn seek(&mut self, cursor: u16, shadow: u16) {
        self.cursor = cursor;
        self.shadow = shadow;
        self.filled = self.filled.max(shadow.min(Self::CAPACITY));
    }
}
