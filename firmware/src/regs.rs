//! STM32H563 register map (non-secure aliases)
//!
//! Only the registers the board touches are listed.

// Peripheral base addresses
pub const RCC_BASE: u32 = 0x4402_0C00;
pub const PWR_BASE: u32 = 0x4402_0800;
pub const FLASH_BASE: u32 = 0x4002_2000;
pub const GPIOA_BASE: u32 = 0x4202_0000;
pub const GPIOB_BASE: u32 = 0x4202_0400;
pub const GPIOC_BASE: u32 = 0x4202_0800;
pub const GPIOD_BASE: u32 = 0x4202_0C00;
pub const GPIOE_BASE: u32 = 0x4202_1000;
pub const GPIOF_BASE: u32 = 0x4202_1400;
pub const GPIOG_BASE: u32 = 0x4202_1800;
pub const ADC1_BASE: u32 = 0x4202_8000;
pub const ADC2_BASE: u32 = 0x4202_8100;
pub const DAC1_BASE: u32 = 0x4202_8400;
pub const GPDMA1_BASE: u32 = 0x4002_0000;
pub const GPDMA2_BASE: u32 = 0x4002_1000;
pub const TIM1_BASE: u32 = 0x4001_2C00;
pub const TIM5_BASE: u32 = 0x4000_0C00;
pub const TIM6_BASE: u32 = 0x4000_1000;
pub const TIM7_BASE: u32 = 0x4000_1400;
pub const TIM8_BASE: u32 = 0x4001_3400;
pub const TIM16_BASE: u32 = 0x4001_4400;
pub const TIM17_BASE: u32 = 0x4001_4800;

// RCC
pub const RCC_CR: u32 = 0x00;
pub const RCC_CFGR1: u32 = 0x1C;
pub const RCC_PLL1CFGR: u32 = 0x28;
pub const RCC_PLL1DIVR: u32 = 0x34;
pub const RCC_AHB1ENR: u32 = 0x88;
pub const RCC_AHB2ENR: u32 = 0x8C;
pub const RCC_APB1LENR: u32 = 0x9C;
pub const RCC_APB2ENR: u32 = 0xA4;

pub const RCC_CR_HSEON: u32 = 1 << 16;
pub const RCC_CR_HSERDY: u32 = 1 << 17;
pub const RCC_CR_PLL1ON: u32 = 1 << 24;
pub const RCC_CR_PLL1RDY: u32 = 1 << 25;

// PWR / FLASH
pub const PWR_VOSCR: u32 = 0x10;
pub const PWR_VOSSR: u32 = 0x0C;
pub const PWR_VOSSR_VOSRDY: u32 = 1 << 3;
pub const FLASH_ACR: u32 = 0x00;

// GPIO
pub const GPIO_MODER: u32 = 0x00;  // Mode register
pub const GPIO_IDR: u32 = 0x10;    // Input data register
pub const GPIO_BSRR: u32 = 0x18;   // Bit set/reset register

// General purpose / advanced timers
pub const TIM_CR1: u32 = 0x00;     // Control register 1
pub const TIM_CR2: u32 = 0x04;     // Control register 2 (TRGO)
pub const TIM_DIER: u32 = 0x0C;    // Interrupt enable
pub const TIM_SR: u32 = 0x10;      // Status
pub const TIM_EGR: u32 = 0x14;     // Event generation
pub const TIM_CCMR1: u32 = 0x18;   // Capture/compare mode 1
pub const TIM_CCER: u32 = 0x20;    // Capture/compare enable
pub const TIM_CNT: u32 = 0x24;     // Counter
pub const TIM_PSC: u32 = 0x28;     // Prescaler
pub const TIM_ARR: u32 = 0x2C;     // Auto-reload
pub const TIM_CCR1: u32 = 0x34;    // Compare 1
pub const TIM_CCR2: u32 = 0x38;    // Compare 2
pub const TIM_BDTR: u32 = 0x44;    // Break and dead-time

pub const TIM_CR1_CEN: u32 = 1 << 0;
pub const TIM_DIER_UIE: u32 = 1 << 0;
pub const TIM_DIER_CC1IE: u32 = 1 << 1;
pub const TIM_SR_UIF: u32 = 1 << 0;
pub const TIM_SR_CC1IF: u32 = 1 << 1;
pub const TIM_EGR_UG: u32 = 1 << 0;
pub const TIM_CR2_MMS_UPDATE: u32 = 0b010 << 4;

// ADC
pub const ADC_ISR: u32 = 0x00;
pub const ADC_IER: u32 = 0x04;
pub const ADC_CR: u32 = 0x08;
pub const ADC_CFGR: u32 = 0x0C;
pub const ADC_SMPR1: u32 = 0x14;
pub const ADC_TR1: u32 = 0x20;
pub const ADC_TR2: u32 = 0x24;
pub const ADC_SQR1: u32 = 0x30;
pub const ADC_DR: u32 = 0x40;
pub const ADC_AWD2CR: u32 = 0xA0;

pub const ADC_ISR_ADRDY: u32 = 1 << 0;
pub const ADC_ISR_AWD1: u32 = 1 << 7;
pub const ADC_ISR_AWD2: u32 = 1 << 8;
pub const ADC_IER_AWD1IE: u32 = 1 << 7;
pub const ADC_IER_AWD2IE: u32 = 1 << 8;
pub const ADC_CR_ADEN: u32 = 1 << 0;
pub const ADC_CR_ADSTART: u32 = 1 << 2;
pub const ADC_CR_ADSTP: u32 = 1 << 4;
pub const ADC_CR_ADVREGEN: u32 = 1 << 28;
pub const ADC_CR_DEEPPWD: u32 = 1 << 29;
pub const ADC_CFGR_DMAEN: u32 = 1 << 0;
pub const ADC_CFGR_DMACFG: u32 = 1 << 1;
pub const ADC_CFGR_EXTEN_RISING: u32 = 0b01 << 10;
pub const ADC_CFGR_AWD1SGL: u32 = 1 << 22;
pub const ADC_CFGR_AWD1EN: u32 = 1 << 23;
pub const ADC_CFGR_AWD1CH_SHIFT: u32 = 26;
pub const ADC_CFGR_AWD1_MASK: u32 = (0x1F << ADC_CFGR_AWD1CH_SHIFT) | ADC_CFGR_AWD1SGL | ADC_CFGR_AWD1EN;
/// adc_ext_trg for TIM8_TRGO
pub const ADC_EXTSEL_TIM8_TRGO: u32 = 7 << 5;

// DAC
pub const DAC_CR: u32 = 0x00;
pub const DAC_DHR12R1: u32 = 0x08;
pub const DAC_DHR12R2: u32 = 0x14;
/// EN1 | TEN1 | DMAEN1, trigger select in TSEL1
pub const DAC_CR_CH1_DMA: u32 = (1 << 0) | (1 << 1) | (1 << 12);
pub const DAC_CR_CH2_DMA: u32 = DAC_CR_CH1_DMA << 16;
pub const DAC_TSEL1_SHIFT: u32 = 2;
pub const DAC_TSEL2_SHIFT: u32 = 18;
pub const DAC_TRIG_TIM6_TRGO: u32 = 5;
pub const DAC_TRIG_TIM7_TRGO: u32 = 6;

// GPDMA channel registers, relative to the channel block
pub const GPDMA_CH_OFFSET: u32 = 0x50;
pub const GPDMA_CH_STRIDE: u32 = 0x80;
pub const DMA_CLBAR: u32 = 0x00;
pub const DMA_CFCR: u32 = 0x0C;
pub const DMA_CSR: u32 = 0x10;
pub const DMA_CCR: u32 = 0x14;
pub const DMA_CTR1: u32 = 0x40;
pub const DMA_CTR2: u32 = 0x44;
pub const DMA_CBR1: u32 = 0x48;
pub const DMA_CSAR: u32 = 0x4C;
pub const DMA_CDAR: u32 = 0x50;
pub const DMA_CLLR: u32 = 0x7C;
pub const DMA_CBR1_BNDT_MASK: u32 = 0xFFFF;

pub const DMA_CCR_EN: u32 = 1 << 0;
pub const DMA_CCR_RESET: u32 = 1 << 1;
pub const DMA_CCR_TCIE: u32 = 1 << 8;
pub const DMA_CCR_HTIE: u32 = 1 << 9;
pub const DMA_CSR_TCF: u32 = 1 << 8;
pub const DMA_CSR_HTF: u32 = 1 << 9;
pub const DMA_FLAGS_ALL: u32 = 0x7F << 8;
pub const DMA_CTR1_HALFWORDS: u32 = 0b01 | (0b01 << 16);
pub const DMA_CTR1_SINC: u32 = 1 << 3;
pub const DMA_CTR1_DINC: u32 = 1 << 19;
pub const DMA_CTR2_DREQ: u32 = 1 << 10;
pub const DMA_CLLR_ULL: u32 = 1 << 16;
pub const DMA_CLLR_UDA: u32 = 1 << 27;
pub const DMA_CLLR_USA: u32 = 1 << 28;
pub const DMA_CLLR_UB1: u32 = 1 << 29;

// GPDMA request lines
pub const DMA_REQ_ADC1: u32 = 0;
pub const DMA_REQ_ADC2: u32 = 1;
pub const DMA_REQ_DAC1_CH1: u32 = 2;
pub const DMA_REQ_DAC1_CH2: u32 = 3;

#[inline(always)]
pub fn read(base: u32, offset: u32) -> u32 {
    // SAFETY: addresses come from the constants above and are aligned MMIO
    unsafe { core::ptr::read_volatile((base + offset) as *const u32) }
}

#[inline(always)]
pub fn write(base: u32, offset: u32, value: u32) {
    // SAFETY: see `read`
    unsafe { core::ptr::write_volatile((base + offset) as *mut u32, value) }
}

#[inline(always)]
pub fn modify(base: u32, offset: u32, f: impl FnOnce(u32) -> u32) {
    write(base, offset, f(read(base, offset)));
}

/// Spin until `done` holds; false on timeout
pub fn wait_for(mut done: impl FnMut() -> bool, spins: u32) -> bool {
    for _ in 0..spins {
        if done() {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}

/// Base address of one GPDMA channel
pub const fn dma_channel(controller: u32, channel: u32) -> u32 {
    controller + GPDMA_CH_OFFSET + GPDMA_CH_STRIDE * channel
}
