//! Embassy tasks

use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};
use instrument_core::{CommandKind, Dispatch, StreamScheduler};

use crate::usb::RX_FRAMES;
use crate::with_instrument;

/// Foreground loop: dispatch host frames, then stream one sample frame
#[embassy_executor::task]
pub async fn control_task() {
    #[cfg(feature = "defmt")]
    defmt::info!("🎛️ Control task started");

    let mut scheduler = StreamScheduler::new();
    let pace_us = with_instrument(|inst, _| inst.config().stream_pace_us);
    let pace = Duration::from_micros(u64::from(pace_us));

    loop {
        while let Ok(frame) = RX_FRAMES.try_receive() {
            match with_instrument(|inst, board| {
                let outcome = inst.handle_frame(&frame, board);
                if let Ok(Dispatch::Acked(CommandKind::Handshake)) = outcome {
                    board.host_activity();
                }
                outcome
            }) {
                Ok(_dispatch) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("📨 {}", _dispatch);
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("⚠️ Command failed: {}", _e);
                }
            }
        }

        match with_instrument(|inst, board| scheduler.service(inst, board)) {
            // Let the bulk endpoint drain
            Ok(Some(_)) => Timer::after(pace).await,
            Ok(None) => yield_now().await,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("⚠️ Streaming failed: {}", _e);
                yield_now().await;
            }
        }
    }
}
