//! Board wiring

use crate::regs::*;

/// (port base, pin number)
pub type PinId = (u32, u8);

/// Channel 0 front-end: offset, attenuation, x10, x5, x2.5, x1
pub const CH0_FRONT_END: [PinId; 6] = [
    (GPIOD_BASE, 2),
    (GPIOD_BASE, 1),
    (GPIOD_BASE, 0),
    (GPIOC_BASE, 12),
    (GPIOC_BASE, 11),
    (GPIOC_BASE, 10),
];

/// Channel 1 front-end, same order
pub const CH1_FRONT_END: [PinId; 6] = [
    (GPIOE_BASE, 7),
    (GPIOG_BASE, 1),
    (GPIOG_BASE, 0),
    (GPIOB_BASE, 10),
    (GPIOE_BASE, 15),
    (GPIOE_BASE, 14),
];

/// Generator output gain select, indexed by output
pub const AWG_GAIN: [PinId; 2] = [(GPIOE_BASE, 13), (GPIOE_BASE, 12)];

/// Status LEDs
pub const LED_HEARTBEAT: PinId = (GPIOD_BASE, 4);
pub const LED_HOST: PinId = (GPIOD_BASE, 6);

/// All sixteen logic inputs
pub const LOGIC_PORT: u32 = GPIOF_BASE;

/// ADC input channel sampled by ADC1 (scope channel 0) and ADC2 (channel 1)
pub const ADC_INPUTS: [u32; 2] = [0, 3];
