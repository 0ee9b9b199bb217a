#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Board adapters for the servo scheduler.
//!
//! Servo signals leave the MCU on four GPIOs driven as plain push-pull
//! outputs; the pulse high phase is a busy wait on the embassy time driver.

pub mod timer;

#[cfg(target_os = "none")]
use embassy_stm32::gpio::{Flex, Speed};
use servo_core::channels::MAX_CHANNELS;
#[cfg(target_os = "none")]
use servo_core::hal::{BusyWait, OutputPins, PinLevel};

/// Servo header positions on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServoPin {
    S1,
    S2,
    S3,
    S4,
}

impl ServoPin {
    /// Every header position in board order.
    pub const ALL: [ServoPin; MAX_CHANNELS] =
        [ServoPin::S1, ServoPin::S2, ServoPin::S3, ServoPin::S4];

    /// Index into the pin bank.
    pub const fn index(self) -> usize {
        match self {
            ServoPin::S1 => 0,
            ServoPin::S2 => 1,
            ServoPin::S3 => 2,
            ServoPin::S4 => 3,
        }
    }

    /// Silkscreen label for logs.
    pub const fn label(self) -> &'static str {
        match self {
            ServoPin::S1 => "S1",
            ServoPin::S2 => "S2",
            ServoPin::S3 => "S3",
            ServoPin::S4 => "S4",
        }
    }
}

/// GPIO bank backing the servo header.
#[cfg(target_os = "none")]
pub struct FlexPinBank<'d> {
    pins: [Flex<'d>; MAX_CHANNELS],
}

#[cfg(target_os = "none")]
impl<'d> FlexPinBank<'d> {
    pub fn new(pins: [Flex<'d>; MAX_CHANNELS]) -> Self {
        Self { pins }
    }

    fn pin_mut(&mut self, pin: ServoPin) -> &mut Flex<'d> {
        &mut self.pins[pin.index()]
    }
}

#[cfg(target_os = "none")]
impl OutputPins for FlexPinBank<'_> {
    type Pin = ServoPin;

    fn set_output_mode(&mut self, pin: ServoPin) {
        let output = self.pin_mut(pin);
        output.set_low();
        output.set_as_output(Speed::Low);
    }

    fn set_level(&mut self, pin: ServoPin, level: PinLevel) {
        let output = self.pin_mut(pin);
        match level {
            PinLevel::High => output.set_high(),
            PinLevel::Low => output.set_low(),
        }
    }
}

/// Busy wait backed by the embassy time driver.
#[cfg(target_os = "none")]
#[derive(Copy, Clone, Debug, Default)]
pub struct BlockingDelay;

#[cfg(target_os = "none")]
impl BlockingDelay {
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "none")]
impl BusyWait for BlockingDelay {
    fn busy_wait_us(&mut self, micros: u32) {
        embassy_time::block_for(embassy_time::Duration::from_micros(u64::from(micros)));
    }
}
