//! Collaborator abstractions the pulse scheduler drives.
//!
//! The scheduler never touches registers directly. Firmware and emulator
//! targets implement these traits for their pins, their one-shot timer and
//! their busy-wait primitive, while the no-op implementations below let tests
//! and tooling exercise the scheduling logic without any hardware.

use core::fmt;
use core::marker::PhantomData;
use core::time::Duration;

/// Logical level driven onto an output pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinLevel {
    Low,
    High,
}

/// Abstraction over the GPIO lines servo signals are emitted on.
pub trait OutputPins {
    /// Hardware pin identifier handed to [`ServoHandle::attach`](crate::handle::ServoHandle::attach).
    type Pin: Copy + Eq + fmt::Debug;

    /// Switches the pin into push-pull output mode.
    fn set_output_mode(&mut self, pin: Self::Pin);

    /// Drives the pin to the requested level.
    fn set_level(&mut self, pin: Self::Pin, level: PinLevel);
}

/// One-shot timer shared by every channel.
///
/// Whoever owns the timer is responsible for calling
/// [`PulseScheduler::on_timer`](crate::scheduler::PulseScheduler::on_timer)
/// once an armed delay expires.
pub trait PulseTimer {
    /// Arms the timer to expire after `delay`. `repeat` mirrors the peripheral
    /// flag; the scheduler re-arms on every expiry, so it is never relied upon.
    fn arm(&mut self, delay: Duration, repeat: bool);

    /// Cancels any pending expiry.
    fn disarm(&mut self);
}

/// Blocking delay accurate to microseconds.
pub trait BusyWait {
    /// Spins for `micros` microseconds.
    fn busy_wait_us(&mut self, micros: u32);
}

/// Pin bank that performs no hardware interaction.
pub struct NoopPins<P = u8> {
    _pin: PhantomData<P>,
}

impl<P> NoopPins<P> {
    /// Creates a new no-op pin bank.
    pub const fn new() -> Self {
        Self { _pin: PhantomData }
    }
}

impl<P> Default for NoopPins<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> OutputPins for NoopPins<P>
where
    P: Copy + Eq + fmt::Debug,
{
    type Pin = P;

    fn set_output_mode(&mut self, _: P) {}

    fn set_level(&mut self, _: P, _: PinLevel) {}
}

/// Timer that never fires.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTimer;

impl NoopTimer {
    /// Creates a new no-op timer.
    pub const fn new() -> Self {
        Self
    }
}

impl PulseTimer for NoopTimer {
    fn arm(&mut self, _: Duration, _: bool) {}

    fn disarm(&mut self) {}
}

/// Delay that returns immediately.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDelay;

impl NoopDelay {
    /// Creates a new no-op delay.
    pub const fn new() -> Self {
        Self
    }
}

impl BusyWait for NoopDelay {
    fn busy_wait_us(&mut self, _: u32) {}
}
