//! Clock tree and buffer sizing

/// 8 MHz bypass clock from the debugger
pub const HSE_HZ: u32 = 8_000_000;
/// PLL1: /1, x62.5, /2
pub const PLL1_M: u32 = 1;
pub const PLL1_N: u32 = 62;
pub const PLL1_FRACN: u32 = 4096;
pub const PLL1_P: u32 = 2;
pub const SYSCLK_HZ: u32 = 250_000_000;
/// Flash wait states at SYSCLK_HZ
pub const FLASH_LATENCY: u32 = 5;

/// SysTick rate, must match the embassy-time tick feature
pub const TICK_HZ: u32 = 100_000;

/// Conversions per DMA half block; the shadow counter may lead the rings by
/// at most this many samples
pub const STAGING_HALF: usize = 64;

/// Host frames waiting for the foreground loop
pub const RX_QUEUE_DEPTH: usize = 4;
/// Device frames waiting for the bulk IN endpoint
pub const TX_QUEUE_DEPTH: usize = 8;

/// Spin budget for oscillator and regulator ready flags
pub const READY_SPINS: u32 = 1_000_000;
