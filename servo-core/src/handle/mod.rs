//! User-facing servo handles.
//!
//! A [`ServoHandle`] remembers which slot it is bound to and its calibration
//! range. It owns no hardware: every operation borrows the
//! [`PulseScheduler`] that holds the table and the timer, so any number of
//! handles can coexist while only `N` are attached at once.
//!
//! Out-of-range commands are clamped, never rejected, and operations on a
//! detached handle quietly do nothing.

use crate::channels::{
    DEFAULT_MAX_PULSE_WIDTH_US, DEFAULT_MIN_PULSE_WIDTH_US, DEFAULT_NEUTRAL_PULSE_WIDTH_US,
    PulseBounds, SlotId,
};
use crate::hal::{BusyWait, OutputPins, PulseTimer};
use crate::mapping::{ANGLE_THRESHOLD, MAX_ANGLE_DEGREES, angle_to_us, us_to_angle};
use crate::scheduler::PulseScheduler;
use crate::telemetry::TelemetrySink;

pub use crate::scheduler::AttachError;

/// Optional arguments for [`ServoHandle::attach_with`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttachConfig {
    pub min_us: u16,
    pub max_us: u16,
    /// Initial command, interpreted exactly like [`ServoHandle::write`].
    pub initial_value: i32,
}

impl AttachConfig {
    /// Config with explicit calibration and the neutral initial width.
    pub const fn with_bounds(min_us: u16, max_us: u16) -> Self {
        Self {
            min_us,
            max_us,
            initial_value: DEFAULT_NEUTRAL_PULSE_WIDTH_US as i32,
        }
    }

    /// Replaces the initial command.
    pub const fn with_initial_value(mut self, initial_value: i32) -> Self {
        self.initial_value = initial_value;
        self
    }
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self::with_bounds(DEFAULT_MIN_PULSE_WIDTH_US, DEFAULT_MAX_PULSE_WIDTH_US)
    }
}

/// Binding between one servo and a scheduler slot.
///
/// Not `Clone`: a handle is the sole owner of its slot.
#[derive(Debug)]
pub struct ServoHandle<Pin> {
    slot: Option<SlotId>,
    pin: Option<Pin>,
    bounds: PulseBounds,
}

impl<Pin> ServoHandle<Pin>
where
    Pin: Copy + Eq + core::fmt::Debug,
{
    /// Creates an unbound handle with default calibration.
    pub fn new() -> Self {
        Self {
            slot: None,
            pin: None,
            bounds: PulseBounds::default(),
        }
    }

    /// Attaches to `pin` with default calibration and a neutral initial width.
    pub fn attach<P, T, D, S, const N: usize>(
        &mut self,
        scheduler: &mut PulseScheduler<P, T, D, S, N>,
        pin: Pin,
    ) -> Result<Pin, AttachError>
    where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        self.attach_with(scheduler, pin, AttachConfig::default())
    }

    /// Attaches to `pin` with explicit calibration and initial command.
    ///
    /// An already attached handle keeps its slot and pin; only the calibration
    /// and the commanded value are refreshed. Returns the bound pin.
    pub fn attach_with<P, T, D, S, const N: usize>(
        &mut self,
        scheduler: &mut PulseScheduler<P, T, D, S, N>,
        pin: Pin,
        config: AttachConfig,
    ) -> Result<Pin, AttachError>
    where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        let bound_pin = match (self.slot, self.pin) {
            (Some(_), Some(bound)) => bound,
            _ => {
                let slot = scheduler.claim(pin)?;
                self.slot = Some(slot);
                self.pin = Some(pin);
                pin
            }
        };

        self.bounds = PulseBounds::clamped(config.min_us, config.max_us);
        self.write(scheduler, config.initial_value);

        Ok(bound_pin)
    }

    /// Stops pulsing and releases the slot for other handles.
    pub fn detach<P, T, D, S, const N: usize>(
        &mut self,
        scheduler: &mut PulseScheduler<P, T, D, S, N>,
    ) where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        if let Some(slot) = self.slot.take() {
            self.pin = None;
            scheduler.release(slot);
        }
    }

    /// Commands the servo. Values below 200 are degrees (clamped to
    /// `0..=180`); anything else is a pulse width in microseconds.
    pub fn write<P, T, D, S, const N: usize>(
        &mut self,
        scheduler: &mut PulseScheduler<P, T, D, S, N>,
        value: i32,
    ) where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        let micros = if value < ANGLE_THRESHOLD {
            i32::from(angle_to_us(value.clamp(0, MAX_ANGLE_DEGREES), self.bounds))
        } else {
            value
        };
        self.write_microseconds(scheduler, micros);
    }

    /// Commands a pulse width, clamped to the handle's calibration.
    pub fn write_microseconds<P, T, D, S, const N: usize>(
        &mut self,
        scheduler: &mut PulseScheduler<P, T, D, S, N>,
        micros: i32,
    ) where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        let pulse_width_us = self.bounds.clamp(micros);
        if let Some(slot) = self.slot {
            scheduler.set_pulse_width(slot, pulse_width_us);
        }
    }

    /// Last commanded position in degrees, or 0 when detached.
    pub fn read<P, T, D, S, const N: usize>(&self, scheduler: &PulseScheduler<P, T, D, S, N>) -> i32
    where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        match self.stored_width(scheduler) {
            Some(micros) => us_to_angle(micros, self.bounds),
            None => 0,
        }
    }

    /// Last commanded pulse width in microseconds, or 0 when detached.
    pub fn read_microseconds<P, T, D, S, const N: usize>(
        &self,
        scheduler: &PulseScheduler<P, T, D, S, N>,
    ) -> u16
    where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        self.stored_width(scheduler).unwrap_or(0)
    }

    fn stored_width<P, T, D, S, const N: usize>(
        &self,
        scheduler: &PulseScheduler<P, T, D, S, N>,
    ) -> Option<u16>
    where
        P: OutputPins<Pin = Pin>,
        T: PulseTimer,
        D: BusyWait,
        S: TelemetrySink,
    {
        self.slot
            .and_then(|slot| scheduler.table().pulse_width(slot))
    }

    /// Returns `true` while the handle is bound to a slot.
    pub const fn attached(&self) -> bool {
        self.slot.is_some()
    }

    /// Slot this handle is bound to.
    pub const fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// Pin this handle is bound to.
    pub const fn pin(&self) -> Option<Pin> {
        self.pin
    }

    /// Calibration range in effect.
    pub const fn bounds(&self) -> PulseBounds {
        self.bounds
    }
}

impl<Pin> Default for ServoHandle<Pin>
where
    Pin: Copy + Eq + core::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
