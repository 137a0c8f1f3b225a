//! Bulk endpoint frame queues
//!
//! The USB device class driver pushes every complete OUT packet through
//! [`on_frame_received`] and drains IN packets with [`next_outgoing`].
//! Neither side ever waits on the other.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use instrument_core::{HalError, RawFrame, Transport, FRAME_LEN};

use crate::memory::{RX_QUEUE_DEPTH, TX_QUEUE_DEPTH};

/// One IN packet, 64 bytes or the short rejection literal
pub type OutFrame = Vec<u8, FRAME_LEN>;

pub static RX_FRAMES: Channel<CriticalSectionRawMutex, RawFrame, RX_QUEUE_DEPTH> = Channel::new();
pub static TX_FRAMES: Channel<CriticalSectionRawMutex, OutFrame, TX_QUEUE_DEPTH> = Channel::new();

/// Queue a host frame for the foreground loop. False if the queue was full
/// and the frame was lost.
pub fn on_frame_received(frame: &RawFrame) -> bool {
    let queued = RX_FRAMES.try_send(*frame).is_ok();
    #[cfg(feature = "defmt")]
    if !queued {
        defmt::warn!("⚠️ Host frame lost, tag {}", frame[0]);
    }
    queued
}

/// Next packet for the IN endpoint
pub fn next_outgoing() -> Option<OutFrame> {
    TX_FRAMES.try_receive().ok()
}

/// Transmit path; a full IN queue is the busy condition
pub struct UsbBulkTransport;

impl Transport for UsbBulkTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        let frame = OutFrame::from_slice(bytes).map_err(|_| HalError::InvalidConfig)?;
        TX_FRAMES.try_send(frame).map_err(|_| HalError::TransportBusy)
    }
}
