//! STM32H563 Hardware Implementation
//!
//! Register-level board support: two ADCs paced by TIM8 with GPDMA1
//! staging, TIM17 shadow counter, TIM5/TIM16 logic pacing, TIM6/TIM7 driven
//! DAC outputs with TIM1 offset PWM.

use core::cell::UnsafeCell;
use core::convert::Infallible;
use core::sync::atomic::{compiler_fence, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};
use instrument_core::{
    AnalogChannel, AwgChannel, AwgChannelConfig, Band, Digitizer, EmbeddedHalFrontEnd, HalError,
    InstrumentHal, LogicPort, LogicTiming, SampleRate, SampleTime, SettlingSkip, StagingHalves,
    WatchdogBands, WaveformTimers, ADC_FULL_SCALE,
};

use crate::memory::*;
use crate::pins::{self, PinId};
use crate::regs::*;
use crate::usb::UsbBulkTransport;

/// GPIO output driven through BSRR
#[derive(Copy, Clone)]
pub struct RegisterPin {
    port: u32,
    pin: u8,
}

impl RegisterPin {
    pub const fn new(port: u32, pin: u8) -> Self {
        Self { port, pin }
    }

    pub const fn from_id(id: PinId) -> Self {
        Self::new(id.0, id.1)
    }

    /// Switch the pin to general purpose output
    fn init(&self) {
        let shift = u32::from(self.pin) * 2;
        modify(self.port, GPIO_MODER, |v| (v & !(0b11 << shift)) | (0b01 << shift));
    }

    fn set(&self, high: bool) {
        let bit = if high { 1 << self.pin } else { 1 << (self.pin + 16) };
        write(self.port, GPIO_BSRR, bit);
    }

    pub fn toggle(&self) {
        let high = read(self.port, GPIO_IDR) & (1 << self.pin) != 0;
        self.set(!high);
    }
}

impl ErrorType for RegisterPin {
    type Error = Infallible;
}

impl OutputPin for RegisterPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

const fn pin_bank(ids: [PinId; 6]) -> [RegisterPin; 6] {
    let mut bank = [RegisterPin::new(0, 0); 6];
    let mut i = 0;
    while i < 6 {
        bank[i] = RegisterPin::from_id(ids[i]);
        i += 1;
    }
    bank
}

pub type Stm32FrontEnd = EmbeddedHalFrontEnd<RegisterPin>;

/// One self-reloading GPDMA linked-list item: CBR1, CSAR or CDAR, CLLR
#[repr(C, align(64))]
struct LinkedItems(UnsafeCell<[[u32; 3]; 4]>);

// SAFETY: items are written only while their channel is reset, inside the
// board mutex
unsafe impl Sync for LinkedItems {}

static LINKED_ITEMS: LinkedItems = LinkedItems(UnsafeCell::new([[0; 3]; 4]));

const LLI_ADC1: usize = 0;
const LLI_ADC2: usize = 1;
const LLI_DAC1: usize = 2;
const LLI_DAC2: usize = 3;

/// Address side reloaded each block
#[derive(Copy, Clone)]
enum Reload {
    Source,
    Destination,
}

/// One GPDMA channel running a circular half-word transfer
struct DmaChannel {
    base: u32,
    request: u32,
    item: usize,
}

impl DmaChannel {
    const fn new(controller: u32, channel: u32, request: u32, item: usize) -> Self {
        Self {
            base: dma_channel(controller, channel),
            request,
            item,
        }
    }

    fn stop(&self) {
        write(self.base, DMA_CCR, DMA_CCR_RESET);
        write(self.base, DMA_CFCR, DMA_FLAGS_ALL);
    }

    fn start_circular(&self, src: u32, dst: u32, halfwords: usize, reload: Reload, ccr: u32) {
        self.stop();
        let bytes = (halfwords * 2) as u32;
        let (ctr1, ctr2, head, update) = match reload {
            Reload::Source => (
                DMA_CTR1_HALFWORDS | DMA_CTR1_SINC,
                self.request | DMA_CTR2_DREQ,
                src,
                DMA_CLLR_USA,
            ),
            Reload::Destination => (
                DMA_CTR1_HALFWORDS | DMA_CTR1_DINC,
                self.request,
                dst,
                DMA_CLLR_UDA,
            ),
        };

        // SAFETY: the channel is reset, nothing reads this item concurrently
        let item = unsafe { &mut (*LINKED_ITEMS.0.get())[self.item] };
        let item_addr = item.as_ptr() as u32;
        let cllr = DMA_CLLR_UB1 | update | DMA_CLLR_ULL | (item_addr & 0xFFFC);
        *item = [bytes, head, cllr];
        compiler_fence(Ordering::SeqCst);

        write(self.base, DMA_CTR1, ctr1);
        write(self.base, DMA_CTR2, ctr2);
        write(self.base, DMA_CBR1, bytes);
        write(self.base, DMA_CSAR, src);
        write(self.base, DMA_CDAR, dst);
        write(self.base, DMA_CLBAR, item_addr & 0xFFFF_0000);
        write(self.base, DMA_CLLR, cllr);
        write(self.base, DMA_CCR, DMA_CCR_EN | ccr);
    }

    /// Half-words written into the current block
    fn written(&self, halfwords: usize) -> usize {
        let remaining = (read(self.base, DMA_CBR1) & DMA_CBR1_BNDT_MASK) as usize / 2;
        halfwords.saturating_sub(remaining)
    }

    /// Read and clear the half/complete flags
    fn take_flags(&self) -> u32 {
        let flags = read(self.base, DMA_CSR) & (DMA_CSR_HTF | DMA_CSR_TCF);
        write(self.base, DMA_CFCR, flags);
        flags
    }
}

/// Circular DMA targets for both ADCs
#[repr(C, align(4))]
struct Staging(UnsafeCell<[[u16; 2 * STAGING_HALF]; 2]>);

// SAFETY: DMA writes one half while the CPU copies the other
unsafe impl Sync for Staging {}

static STAGING: Staging = Staging(UnsafeCell::new([[0; 2 * STAGING_HALF]; 2]));

/// Watchdog flags raised since the last service
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchdogEvent {
    pub far: bool,
    pub near: bool,
}

const ADCS: [u32; 2] = [ADC1_BASE, ADC2_BASE];

/// DMA progress captured when conversions stop, before the channel reset
#[derive(Copy, Clone)]
struct DmaSnapshot {
    flags: u32,
    written: usize,
}

/// Both ADCs, their DMA channels, the conversion trigger and the shadow timer
pub struct Stm32Digitizer {
    dma: [DmaChannel; 2],
    armed: Option<usize>,
    /// The armed comparators fire once as soon as they are enabled
    settling: SettlingSkip,
    halves: StagingHalves<STAGING_HALF>,
    stopped_at: Option<DmaSnapshot>,
}

impl Stm32Digitizer {
    const fn new() -> Self {
        Self {
            dma: [
                DmaChannel::new(GPDMA1_BASE, 1, DMA_REQ_ADC1, LLI_ADC1),
                DmaChannel::new(GPDMA1_BASE, 2, DMA_REQ_ADC2, LLI_ADC2),
            ],
            armed: None,
            settling: SettlingSkip::new(),
            halves: StagingHalves::new(),
            stopped_at: None,
        }
    }

    fn init(&mut self) -> Result<(), HalError> {
        for (adc, input) in ADCS.into_iter().zip(pins::ADC_INPUTS) {
            modify(adc, ADC_CR, |v| (v & !ADC_CR_DEEPPWD) | ADC_CR_ADVREGEN);
            // Regulator start-up, about 20 us
            wait_for(|| false, SYSCLK_HZ / 50_000);
            write(
                adc,
                ADC_CFGR,
                ADC_CFGR_DMAEN | ADC_CFGR_DMACFG | ADC_CFGR_EXTEN_RISING | ADC_EXTSEL_TIM8_TRGO,
            );
            write(adc, ADC_SQR1, input << 6);
            write(adc, ADC_ISR, ADC_ISR_ADRDY);
            modify(adc, ADC_CR, |v| v | ADC_CR_ADEN);
            if !wait_for(|| read(adc, ADC_ISR) & ADC_ISR_ADRDY != 0, READY_SPINS) {
                return Err(HalError::PeripheralInit);
            }
        }
        write(TIM8_BASE, TIM_CR2, TIM_CR2_MMS_UPDATE);
        write(TIM17_BASE, TIM_DIER, TIM_DIER_UIE);
        Ok(())
    }

    /// Read and clear the comparator flags of `adc`
    pub fn take_watchdog(&mut self, adc: usize) -> WatchdogEvent {
        let base = ADCS[adc];
        let isr = read(base, ADC_ISR) & read(base, ADC_IER) & (ADC_ISR_AWD1 | ADC_ISR_AWD2);
        write(base, ADC_ISR, isr);
        if self.settling.consume(adc) {
            return WatchdogEvent::default();
        }
        WatchdogEvent {
            far: isr & ADC_ISR_AWD2 != 0,
            near: isr & ADC_ISR_AWD1 != 0,
        }
    }

    /// Which staging half the DMA just finished, if any
    pub fn take_filled_half(&mut self) -> Option<usize> {
        let flags = self.dma[0].take_flags();
        // ADC2 runs in lockstep off the same trigger
        self.dma[1].take_flags();
        let half = filled_half(flags)?;
        self.halves.completed(half);
        Some(half)
    }

    /// Copy of one staging half for both channels
    pub fn staged(&self, half: usize) -> ([u16; STAGING_HALF], [u16; STAGING_HALF]) {
        let start = half * STAGING_HALF;
        let base = STAGING.0.get() as *const u16;
        // SAFETY: both reads are in bounds and the DMA is writing the other half
        unsafe {
            let ch0 = core::ptr::read_volatile(base.add(start) as *const [u16; STAGING_HALF]);
            let ch1 = core::ptr::read_volatile(
                base.add(2 * STAGING_HALF + start) as *const [u16; STAGING_HALF],
            );
            (ch0, ch1)
        }
    }

    pub fn acknowledge_shadow_tick(&mut self) -> bool {
        let pending = read(TIM17_BASE, TIM_SR) & TIM_SR_UIF != 0;
        write(TIM17_BASE, TIM_SR, !TIM_SR_UIF);
        pending
    }
}

fn filled_half(flags: u32) -> Option<usize> {
    if flags & DMA_CSR_TCF != 0 {
        Some(1)
    } else if flags & DMA_CSR_HTF != 0 {
        Some(0)
    } else {
        None
    }
}

/// Comparator window whose out-of-window condition means "reached `band`"
fn edge_window(band: Band, approaching_from_below: bool) -> (u16, u16) {
    if approaching_from_below {
        (0, band.low.saturating_sub(1))
    } else {
        (band.high.saturating_add(1).min(ADC_FULL_SCALE), ADC_FULL_SCALE)
    }
}

impl Digitizer for Stm32Digitizer {
    fn stop_conversion(&mut self) -> Result<(), HalError> {
        modify(TIM8_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
        modify(TIM17_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
        for adc in ADCS {
            if read(adc, ADC_CR) & ADC_CR_ADSTART != 0 {
                modify(adc, ADC_CR, |v| v | ADC_CR_ADSTP);
                wait_for(|| read(adc, ADC_CR) & ADC_CR_ADSTART == 0, READY_SPINS);
            }
        }
        // Progress must be read before the reset clears the channel
        let running = read(self.dma[0].base, DMA_CCR) & DMA_CCR_EN != 0;
        self.stopped_at = running.then(|| DmaSnapshot {
            flags: read(self.dma[0].base, DMA_CSR) & (DMA_CSR_HTF | DMA_CSR_TCF),
            written: self.dma[0].written(2 * STAGING_HALF),
        });
        for dma in &self.dma {
            dma.stop();
        }
        Ok(())
    }

    fn start_conversion(&mut self) -> Result<(), HalError> {
        self.halves.reset();
        self.stopped_at = None;
        let staging = STAGING.0.get() as *const u16;
        for (i, dma) in self.dma.iter().enumerate() {
            let dst = staging.wrapping_add(i * 2 * STAGING_HALF) as u32;
            let ccr = if i == 0 { DMA_CCR_HTIE | DMA_CCR_TCIE } else { 0 };
            dma.start_circular(ADCS[i] + ADC_DR, dst, 2 * STAGING_HALF, Reload::Destination, ccr);
            modify(ADCS[i], ADC_CR, |v| v | ADC_CR_ADSTART);
        }
        for timer in [TIM8_BASE, TIM17_BASE] {
            write(timer, TIM_CNT, 0);
            write(timer, TIM_EGR, TIM_EGR_UG);
            write(timer, TIM_SR, 0);
        }
        modify(TIM17_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
        modify(TIM8_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
        Ok(())
    }

    fn configure_rate(&mut self, rate: &SampleRate) -> Result<(), HalError> {
        write(TIM8_BASE, TIM_PSC, u32::from(rate.conversion_prescaler));
        write(TIM8_BASE, TIM_ARR, u32::from(rate.conversion_period));
        write(TIM17_BASE, TIM_PSC, u32::from(rate.shadow_prescaler));
        write(TIM17_BASE, TIM_ARR, u32::from(rate.shadow_period));
        Ok(())
    }

    fn set_sample_time(&mut self, sample_time: SampleTime) -> Result<(), HalError> {
        for (adc, input) in ADCS.into_iter().zip(pins::ADC_INPUTS) {
            let shift = input * 3;
            modify(adc, ADC_SMPR1, |v| {
                (v & !(0b111 << shift)) | (u32::from(sample_time.code()) << shift)
            });
        }
        Ok(())
    }

    fn arm_watchdogs(
        &mut self,
        channel: AnalogChannel,
        bands: &WatchdogBands,
    ) -> Result<(), HalError> {
        let adc = channel.index();
        let base = ADCS[adc];
        let from_below = bands.far.high < bands.near.low;
        let (near_lo, near_hi) = edge_window(bands.near, from_below);
        let (far_lo, far_hi) = edge_window(bands.far, from_below);

        self.disarm_watchdogs()?;
        write(base, ADC_TR1, u32::from(near_lo) | (u32::from(near_hi) << 16));
        // Secondary watchdog compares the 8 most significant bits
        write(base, ADC_TR2, u32::from(far_lo >> 4) | (u32::from(far_hi >> 4) << 16));
        let input = pins::ADC_INPUTS[adc];
        modify(base, ADC_CFGR, |v| {
            (v & !ADC_CFGR_AWD1_MASK)
                | ADC_CFGR_AWD1SGL
                | ADC_CFGR_AWD1EN
                | (input << ADC_CFGR_AWD1CH_SHIFT)
        });
        write(base, ADC_AWD2CR, 1 << input);
        write(base, ADC_ISR, ADC_ISR_AWD1 | ADC_ISR_AWD2);
        write(base, ADC_IER, ADC_IER_AWD1IE | ADC_IER_AWD2IE);

        self.armed = Some(adc);
        self.settling.arm(adc);
        Ok(())
    }

    fn disarm_watchdogs(&mut self) -> Result<(), HalError> {
        if let Some(adc) = self.armed.take() {
            let base = ADCS[adc];
            write(base, ADC_IER, 0);
            modify(base, ADC_CFGR, |v| v & !ADC_CFGR_AWD1_MASK);
            write(base, ADC_AWD2CR, 0);
            write(base, ADC_ISR, ADC_ISR_AWD1 | ADC_ISR_AWD2);
        }
        self.settling.clear();
        Ok(())
    }

    fn drain_pending<F: FnMut(&[u16], &[u16])>(&mut self, mut sink: F) -> Result<(), HalError> {
        let Some(snapshot) = self.stopped_at.take() else {
            return Ok(());
        };
        let tail = self.halves.tail(snapshot.written, filled_half(snapshot.flags).is_some());
        if let Some(half) = tail.full {
            let (ch0, ch1) = self.staged(half);
            sink(&ch0, &ch1);
        }
        if tail.partial_len > 0 {
            let (ch0, ch1) = self.staged(tail.partial_half);
            sink(&ch0[..tail.partial_len], &ch1[..tail.partial_len]);
        }
        Ok(())
    }
}

/// TIM5 paces port reads, TIM16 times the post-trigger window
pub struct Stm32LogicPort;

impl Stm32LogicPort {
    fn init(&mut self) {
        // PWM mode 1 on channel 1, compare event raises the sample interrupt
        write(TIM5_BASE, TIM_CCMR1, 0b110 << 4);
        write(TIM5_BASE, TIM_CCER, 1);
    }

    pub fn read_inputs(&self) -> u16 {
        read(pins::LOGIC_PORT, GPIO_IDR) as u16
    }

    pub fn take_sample_event(&mut self) -> bool {
        let pending = read(TIM5_BASE, TIM_SR) & TIM_SR_CC1IF != 0;
        write(TIM5_BASE, TIM_SR, !TIM_SR_CC1IF);
        pending
    }

    pub fn take_confirmation_event(&mut self) -> bool {
        let pending = read(TIM16_BASE, TIM_SR) & TIM_SR_UIF != 0;
        write(TIM16_BASE, TIM_SR, !TIM_SR_UIF);
        pending
    }
}

impl LogicPort for Stm32LogicPort {
    fn configure(&mut self, timing: &LogicTiming) -> Result<(), HalError> {
        write(TIM5_BASE, TIM_ARR, timing.period32);
        write(TIM5_BASE, TIM_CCR1, timing.period32 / 2);
        write(TIM16_BASE, TIM_PSC, u32::from(timing.prescaler16));
        write(TIM16_BASE, TIM_ARR, u32::from(timing.period16));
        for timer in [TIM5_BASE, TIM16_BASE] {
            write(timer, TIM_EGR, TIM_EGR_UG);
            write(timer, TIM_SR, 0);
        }
        Ok(())
    }

    fn start_sampling(&mut self) -> Result<(), HalError> {
        write(TIM5_BASE, TIM_SR, 0);
        write(TIM5_BASE, TIM_DIER, TIM_DIER_CC1IE);
        modify(TIM5_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
        Ok(())
    }

    fn stop_sampling(&mut self) -> Result<(), HalError> {
        modify(TIM5_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
        write(TIM5_BASE, TIM_DIER, 0);
        Ok(())
    }

    fn start_confirmation(&mut self) -> Result<(), HalError> {
        write(TIM16_BASE, TIM_CNT, 0);
        write(TIM16_BASE, TIM_SR, 0);
        write(TIM16_BASE, TIM_DIER, TIM_DIER_UIE);
        modify(TIM16_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);
        Ok(())
    }

    fn stop_confirmation(&mut self) -> Result<(), HalError> {
        modify(TIM16_BASE, TIM_CR1, |v| v & !TIM_CR1_CEN);
        write(TIM16_BASE, TIM_DIER, 0);
        write(TIM16_BASE, TIM_SR, !TIM_SR_UIF);
        Ok(())
    }
}

const AWG_TIMERS: [u32; 2] = [TIM6_BASE, TIM7_BASE];
const AWG_OFFSET_CCR: [u32; 2] = [TIM_CCR1, TIM_CCR2];
const DAC_HOLDING: [u32; 2] = [DAC_DHR12R1, DAC_DHR12R2];

/// DAC outputs fed by GPDMA2, sample clocks on TIM6/TIM7
pub struct Stm32Waveform {
    dma: [DmaChannel; 2],
    gain: [RegisterPin; 2],
}

impl Stm32Waveform {
    const fn new() -> Self {
        Self {
            dma: [
                DmaChannel::new(GPDMA2_BASE, 0, DMA_REQ_DAC1_CH1, LLI_DAC1),
                DmaChannel::new(GPDMA2_BASE, 1, DMA_REQ_DAC1_CH2, LLI_DAC2),
            ],
            gain: [
                RegisterPin::from_id(pins::AWG_GAIN[0]),
                RegisterPin::from_id(pins::AWG_GAIN[1]),
            ],
        }
    }

    fn init(&mut self) {
        for pin in &self.gain {
            pin.init();
        }
        // Offset PWM, channels 1 and 2 in PWM mode 1 with preload
        write(TIM1_BASE, TIM_CCMR1, (0b110 << 4) | (1 << 3) | (0b110 << 12) | (1 << 11));
        write(TIM1_BASE, TIM_CCER, (1 << 0) | (1 << 4));
        write(TIM1_BASE, TIM_ARR, u32::from(ADC_FULL_SCALE));
        write(TIM1_BASE, TIM_BDTR, 1 << 15);
        modify(TIM1_BASE, TIM_CR1, |v| v | TIM_CR1_CEN);

        for timer in AWG_TIMERS {
            write(timer, TIM_CR2, TIM_CR2_MMS_UPDATE);
        }
        write(
            DAC1_BASE,
            DAC_CR,
            DAC_CR_CH1_DMA
                | (DAC_TRIG_TIM6_TRGO << DAC_TSEL1_SHIFT)
                | DAC_CR_CH2_DMA
                | (DAC_TRIG_TIM7_TRGO << DAC_TSEL2_SHIFT),
        );
    }
}

impl WaveformTimers for Stm32Waveform {
    fn program(&mut self, channel: AwgChannel, config: &AwgChannelConfig) -> Result<(), HalError> {
        let i = channel.index();
        write(TIM1_BASE, AWG_OFFSET_CCR[i], u32::from(config.compare_offset));
        write(AWG_TIMERS[i], TIM_ARR, u32::from(config.period));
        write(AWG_TIMERS[i], TIM_PSC, u32::from(config.prescaler));
        Ok(())
    }

    fn set_gain(&mut self, channel: AwgChannel, gain: u8) -> Result<(), HalError> {
        self.gain[channel.index()].set(gain != 0);
        Ok(())
    }

    fn halt(&mut self) -> Result<(), HalError> {
        for timer in AWG_TIMERS {
            modify(timer, TIM_CR1, |v| v & !TIM_CR1_CEN);
        }
        Ok(())
    }

    fn restart_dma(&mut self, channel: AwgChannel, table: &[u16]) -> Result<(), HalError> {
        let i = channel.index();
        let dma = &self.dma[i];
        if table.is_empty() {
            dma.stop();
            return Ok(());
        }
        // Tables live in the static instrument, the DMA keeps reading them
        dma.start_circular(
            table.as_ptr() as u32,
            DAC1_BASE + DAC_HOLDING[i],
            table.len(),
            Reload::Source,
            0,
        );
        Ok(())
    }

    fn commit(&mut self, presets: [u16; 2]) -> Result<(), HalError> {
        for (timer, preset) in AWG_TIMERS.into_iter().zip(presets) {
            // Flush the prescaler counter before presetting
            write(timer, TIM_EGR, TIM_EGR_UG);
            write(timer, TIM_CNT, u32::from(preset));
        }
        let cr6 = read(TIM6_BASE, TIM_CR1) | TIM_CR1_CEN;
        let cr7 = read(TIM7_BASE, TIM_CR1) | TIM_CR1_CEN;
        write(TIM6_BASE, TIM_CR1, cr6);
        write(TIM7_BASE, TIM_CR1, cr7);
        Ok(())
    }
}

/// STM32H563 board
pub struct Board {
    transport: UsbBulkTransport,
    front_end: Stm32FrontEnd,
    digitizer: Stm32Digitizer,
    logic: Stm32LogicPort,
    waveform: Stm32Waveform,
    heartbeat: RegisterPin,
    host_led: RegisterPin,
    initialized: bool,
}

impl Board {
    pub const fn new() -> Self {
        Self {
            transport: UsbBulkTransport,
            front_end: EmbeddedHalFrontEnd::new(
                pin_bank(pins::CH0_FRONT_END),
                pin_bank(pins::CH1_FRONT_END),
            ),
            digitizer: Stm32Digitizer::new(),
            logic: Stm32LogicPort,
            waveform: Stm32Waveform::new(),
            heartbeat: RegisterPin::from_id(pins::LED_HEARTBEAT),
            host_led: RegisterPin::from_id(pins::LED_HOST),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn heartbeat(&self) {
        self.heartbeat.toggle();
    }

    pub fn host_activity(&self) {
        self.host_led.toggle();
    }

    pub fn digitizer_mut(&mut self) -> &mut Stm32Digitizer {
        &mut self.digitizer
    }

    pub fn logic_mut(&mut self) -> &mut Stm32LogicPort {
        &mut self.logic
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentHal for Board {
    type Transport = UsbBulkTransport;
    type FrontEnd = Stm32FrontEnd;
    type Digitizer = Stm32Digitizer;
    type LogicPort = Stm32LogicPort;
    type Waveform = Stm32Waveform;

    fn initialize(&mut self) -> Result<(), HalError> {
        clocks::init()?;

        for id in pins::CH0_FRONT_END.into_iter().chain(pins::CH1_FRONT_END) {
            RegisterPin::from_id(id).init();
        }
        self.heartbeat.init();
        self.host_led.init();

        self.digitizer.init()?;
        self.logic.init();
        self.waveform.init();
        self.initialized = true;

        #[cfg(feature = "defmt")]
        defmt::info!("🔌 STM32H563 HAL initialized at {} Hz", SYSCLK_HZ);

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
        self.digitizer.stop_conversion()?;
        self.digitizer.disarm_watchdogs()?;
        self.logic.stop_sampling()?;
        self.logic.stop_confirmation()?;
        self.waveform.halt()?;
        self.initialized = false;

        #[cfg(feature = "defmt")]
        defmt::info!("🔌 STM32H563 HAL shutdown");
        Ok(())
    }
}

mod clocks {
    //! SYSCLK from PLL1 on the bypassed HSE, peripheral clock gates

    use super::*;

    const RCC_PLL1FRACR: u32 = 0x38;
    const PLL1CFGR_SRC_HSE: u32 = 0b11;
    const PLL1CFGR_RGE_8_16: u32 = 0b11 << 2;
    const PLL1CFGR_FRACEN: u32 = 1 << 4;
    const PLL1CFGR_PEN: u32 = 1 << 16;
    const RCC_CR_HSEBYP: u32 = 1 << 18;
    const CFGR1_SW_PLL1: u32 = 0b11;
    const VOSCR_VOS0: u32 = 0b11 << 4;

    pub fn init() -> Result<(), HalError> {
        write(PWR_BASE, PWR_VOSCR, VOSCR_VOS0);
        if !wait_for(|| read(PWR_BASE, PWR_VOSSR) & PWR_VOSSR_VOSRDY != 0, READY_SPINS) {
            return Err(HalError::PeripheralInit);
        }

        modify(RCC_BASE, RCC_CR, |v| v | RCC_CR_HSEBYP | RCC_CR_HSEON);
        if !wait_for(|| read(RCC_BASE, RCC_CR) & RCC_CR_HSERDY != 0, READY_SPINS) {
            return Err(HalError::PeripheralInit);
        }

        write(
            RCC_BASE,
            RCC_PLL1CFGR,
            PLL1CFGR_SRC_HSE | PLL1CFGR_RGE_8_16 | PLL1CFGR_FRACEN | PLL1CFGR_PEN | (PLL1_M << 8),
        );
        write(RCC_BASE, RCC_PLL1DIVR, (PLL1_N - 1) | ((PLL1_P - 1) << 9) | (1 << 16) | (1 << 24));
        write(RCC_BASE, RCC_PLL1FRACR, PLL1_FRACN << 3);
        modify(RCC_BASE, RCC_CR, |v| v | RCC_CR_PLL1ON);
        if !wait_for(|| read(RCC_BASE, RCC_CR) & RCC_CR_PLL1RDY != 0, READY_SPINS) {
            return Err(HalError::PeripheralInit);
        }

        // Two wait cycles on the programming delay, then latency
        write(FLASH_BASE, FLASH_ACR, FLASH_LATENCY | (0b10 << 4));
        modify(RCC_BASE, RCC_CFGR1, |v| (v & !0b11) | CFGR1_SW_PLL1);
        if !wait_for(|| (read(RCC_BASE, RCC_CFGR1) >> 3) & 0b11 == CFGR1_SW_PLL1, READY_SPINS) {
            return Err(HalError::PeripheralInit);
        }

        // GPDMA1, GPDMA2
        modify(RCC_BASE, RCC_AHB1ENR, |v| v | 0b11);
        // GPIOA..GPIOG, ADC12, DAC1
        modify(RCC_BASE, RCC_AHB2ENR, |v| v | 0x7F | (1 << 10) | (1 << 11));
        // TIM5, TIM6, TIM7
        modify(RCC_BASE, RCC_APB1LENR, |v| v | (1 << 3) | (1 << 4) | (1 << 5));
        // TIM1, TIM8, TIM16, TIM17
        modify(RCC_BASE, RCC_APB2ENR, |v| v | (1 << 11) | (1 << 13) | (1 << 17) | (1 << 18));

        #[cfg(feature = "defmt")]
        defmt::debug!("⏱️ PLL1 locked, HSE {} Hz", HSE_HZ);
        Ok(())
    }
}
