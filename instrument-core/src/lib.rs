#![cfg_attr(not(feature = "std"), no_std)]

//! # Instrument Core
//!
//! Acquisition, trigger, generator and streaming logic for a USB
//! oscilloscope / arbitrary waveform generator / logic analyzer.
//! Hardware is reached only through the traits in [`hal`].

pub mod types;
pub mod ring;
pub mod protocol;
pub mod hal;
pub mod digitizer;
pub mod acquisition;
pub mod logic;
pub mod waveform;
pub mod decoder;
pub mod scheduler;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use ring::SampleRing;
pub use protocol::*;
pub use hal::*;
pub use digitizer::{SettlingSkip, StagedTail, StagingHalves};
pub use acquisition::AcquisitionEngine;
pub use logic::LogicEngine;
pub use waveform::{TableUpload, WaveformSynchronizer};
pub use decoder::*;
pub use scheduler::*;

/// Instrument library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instrument sized for the production capture buffers
pub type DefaultInstrument = Instrument<ADC_BUFFER_LEN, LOGIC_BUFFER_LEN>;

/// Default configuration, tuned on the reference board
pub fn default_config() -> InstrumentConfig {
    InstrumentConfig {
        post_trigger: POST_TRIGGER_DEFAULT,
        shadow_step: SHADOW_STEP,
        watchdog: WatchdogCalibration::DEFAULT,
        stream_pace_us: 150,
    }
}
