//! Command decoding and the instrument context

use core::sync::atomic::{AtomicBool, Ordering};

use crate::acquisition::AcquisitionEngine;
use crate::hal::{FrontEnd, HalError, InstrumentHal, Transport};
use crate::logic::LogicEngine;
use crate::protocol::{
    AckFrame, CommandFrame, ProtocolError, RawFrame, HANDSHAKE_MAGIC, NOPACKET,
};
use crate::types::{AnalogChannel, AwgChannel, InstrumentConfig};
use crate::waveform::WaveformSynchronizer;

/// Inhibits sample streaming while a command is being handled
pub struct TransmitGate {
    held: AtomicBool,
}

impl TransmitGate {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Hold the gate until the guard drops
    pub fn hold(&self) -> GateGuard<'_> {
        self.held.store(true, Ordering::Release);
        GateGuard { gate: self }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_held(&self, held: bool) {
        self.held.store(held, Ordering::Release);
    }
}

impl Default for TransmitGate {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GateGuard<'a> {
    gate: &'a TransmitGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.held.store(false, Ordering::Release);
    }
}

/// Which command a frame carried
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    Handshake,
    AwgSet,
    AdcSet,
    LogicSet,
}

/// Outcome of handling one received frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// Command applied and acknowledged
    Acked(CommandKind),
    /// Unknown tag, `nopacket` sent
    Rejected(u8),
    /// Handshake with the wrong magic
    Ignored,
    /// Frame consumed as generator table data
    TableChunk { complete: bool },
}

/// Send an acknowledgement. A busy transport drops it.
pub fn send_ack<T: Transport>(transport: &mut T) -> Result<(), HalError> {
    send_or_drop(transport, &AckFrame.encode())
}

fn send_or_drop<T: Transport>(transport: &mut T, bytes: &[u8]) -> Result<(), HalError> {
    match transport.transmit(bytes) {
        Err(HalError::TransportBusy) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("⚠️ Reply dropped, transport busy");
            Ok(())
        }
        other => other,
    }
}

/// Everything the foreground and the interrupt handlers share
pub struct Instrument<const A: usize, const L: usize> {
    config: InstrumentConfig,
    pub(crate) acquisition: AcquisitionEngine<A>,
    pub(crate) logic: LogicEngine<L>,
    pub(crate) waveform: WaveformSynchronizer,
    pub(crate) gate: TransmitGate,
}

impl<const A: usize, const L: usize> Instrument<A, L> {
    pub const fn new(config: InstrumentConfig) -> Self {
        Self {
            acquisition: AcquisitionEngine::new(&config),
            logic: LogicEngine::new(),
            waveform: WaveformSynchronizer::new(),
            gate: TransmitGate::new(),
            config,
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn acquisition(&self) -> &AcquisitionEngine<A> {
        &self.acquisition
    }

    pub fn acquisition_mut(&mut self) -> &mut AcquisitionEngine<A> {
        &mut self.acquisition
    }

    pub fn logic(&self) -> &LogicEngine<L> {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut LogicEngine<L> {
        &mut self.logic
    }

    pub fn waveform(&self) -> &WaveformSynchronizer {
        &self.waveform
    }

    pub fn gate(&self) -> &TransmitGate {
        &self.gate
    }

    /// Power-on state: free-running scope, idle generators, logic waiting
    pub fn start<H: InstrumentHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        self.acquisition.boot(hal.digitizer())?;
        self.waveform.boot(hal.waveform())?;
        #[cfg(feature = "defmt")]
        defmt::info!("✅ Instrument started");
        Ok(())
    }

    /// Handle one frame from the host
    pub fn handle_frame<H: InstrumentHal>(
        &mut self,
        raw: &RawFrame,
        hal: &mut H,
    ) -> Result<Dispatch, HalError> {
        let _inhibit = self.gate.hold();

        if self.waveform.upload_pending() {
            let complete = self.waveform.accept_chunk(raw);
            if complete {
                send_ack(hal.transport())?;
                #[cfg(feature = "defmt")]
                defmt::debug!("🌊 Table upload complete");
            }
            return Ok(Dispatch::TableChunk { complete });
        }

        let command = match CommandFrame::parse(raw) {
            Ok(command) => command,
            Err(ProtocolError::UnknownTag(tag)) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("❓ Unknown frame tag {}", tag);
                send_or_drop(hal.transport(), NOPACKET)?;
                return Ok(Dispatch::Rejected(tag));
            }
            Err(_) => {
                send_or_drop(hal.transport(), NOPACKET)?;
                return Ok(Dispatch::Rejected(raw[0]));
            }
        };

        match command {
            CommandFrame::Handshake { magic } => {
                if magic != HANDSHAKE_MAGIC {
                    return Ok(Dispatch::Ignored);
                }
                send_ack(hal.transport())?;
                #[cfg(feature = "defmt")]
                defmt::info!("🤝 Host handshake");
                Ok(Dispatch::Acked(CommandKind::Handshake))
            }
            CommandFrame::AwgSet(cmd) => {
                send_ack(hal.transport())?;
                let channel = AwgChannel::from_wire_lossy(cmd.channel);
                self.waveform.apply(channel, cmd.config, hal.waveform())?;
                Ok(Dispatch::Acked(CommandKind::AwgSet))
            }
            CommandFrame::AdcSet(cmd) => {
                send_ack(hal.transport())?;
                if let Some(channel) = AnalogChannel::from_wire(cmd.channel) {
                    hal.front_end().apply(channel, &cmd.front_end)?;
                }
                self.acquisition.configure(&cmd, hal.digitizer())?;
                Ok(Dispatch::Acked(CommandKind::AdcSet))
            }
            CommandFrame::LogicSet(cmd) => {
                send_ack(hal.transport())?;
                self.logic.configure(&cmd, hal.logic_port())?;
                Ok(Dispatch::Acked(CommandKind::LogicSet))
            }
        }
    }
}
