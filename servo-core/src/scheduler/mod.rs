//! Single scheduling authority for the shared pulse timer.
//!
//! [`PulseScheduler`] owns the channel table, the derived schedule, the cursor
//! naming the slot visited next, and the hardware collaborators. Servo handles
//! only hold a [`SlotId`] and route every mutation through the scheduler.
//!
//! Mutations and the emitter may interleave when the timer fires in interrupt
//! context, so every mutation follows the same order: disarm the timer, update
//! the table, rebuild the schedule, then re-arm only if something is still
//! active. The emitter therefore never observes a schedule built from a
//! different table than the one it reads widths from.

use core::fmt;
use core::time::Duration;

use crate::channels::{ChannelTable, MAX_CHANNELS, SlotId};
use crate::hal::{BusyWait, OutputPins, PinLevel, PulseTimer};
use crate::schedule::{Schedule, SchedulerConfig};
use crate::telemetry::{NoopTelemetry, TelemetryEvent, TelemetrySink};

/// Errors reported when binding a handle to a slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttachError {
    /// Every slot is already claimed by another handle.
    CapacityExhausted,
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::CapacityExhausted => f.write_str("all servo channels are in use"),
        }
    }
}

/// What a single emitter invocation did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EmitOutcome {
    /// Nothing is active; the timer was disarmed.
    Idle,
    /// A pulse was emitted on `slot` and the timer re-armed for `next_in`.
    Pulsed {
        slot: SlotId,
        pulse_width_us: u16,
        next_in: Duration,
    },
    /// `slot` had nothing to pulse but still consumed its turn.
    Skipped { slot: SlotId, next_in: Duration },
}

impl EmitOutcome {
    /// Returns `true` when the timer was re-armed.
    pub const fn rearmed(&self) -> bool {
        !matches!(self, EmitOutcome::Idle)
    }
}

/// Multiplexes one timer across up to `N` servo channels.
pub struct PulseScheduler<P, T, D, S = NoopTelemetry, const N: usize = MAX_CHANNELS>
where
    P: OutputPins,
{
    pins: P,
    timer: T,
    delay: D,
    telemetry: S,
    config: SchedulerConfig,
    table: ChannelTable<P::Pin, N>,
    schedule: Schedule<N>,
    current: SlotId,
}

impl<P, T, D, const N: usize> PulseScheduler<P, T, D, NoopTelemetry, N>
where
    P: OutputPins,
    T: PulseTimer,
    D: BusyWait,
{
    /// Creates a scheduler with the default quantum and no telemetry.
    pub fn new(pins: P, timer: T, delay: D) -> Self {
        Self::with_components(pins, timer, delay, NoopTelemetry, SchedulerConfig::default())
    }
}

impl<P, T, D, S, const N: usize> PulseScheduler<P, T, D, S, N>
where
    P: OutputPins,
    T: PulseTimer,
    D: BusyWait,
    S: TelemetrySink,
{
    /// Creates a scheduler from explicit collaborators.
    pub fn with_components(
        pins: P,
        timer: T,
        delay: D,
        telemetry: S,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pins,
            timer,
            delay,
            telemetry,
            config,
            table: ChannelTable::new(),
            schedule: Schedule::new(),
            current: SlotId::new(0),
        }
    }

    /// Read-only view of the channel table.
    pub fn table(&self) -> &ChannelTable<P::Pin, N> {
        &self.table
    }

    /// Read-only view of the current schedule.
    pub fn schedule(&self) -> &Schedule<N> {
        &self.schedule
    }

    /// Slot the emitter will visit on its next invocation.
    pub const fn current(&self) -> SlotId {
        self.current
    }

    /// Scheduling parameters in effect.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Accesses the pin bank.
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Accesses the timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Mutably accesses the timer.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Accesses the busy-wait delay.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Accesses the telemetry sink.
    pub fn telemetry(&self) -> &S {
        &self.telemetry
    }

    /// Mutably accesses the telemetry sink.
    pub fn telemetry_mut(&mut self) -> &mut S {
        &mut self.telemetry
    }

    /// Claims the lowest free slot for `pin` and drives the pin low as an output.
    ///
    /// Fails without touching the pin or the table when every slot is taken.
    pub(crate) fn claim(&mut self, pin: P::Pin) -> Result<SlotId, AttachError> {
        if self.table.is_full() {
            self.telemetry.record(TelemetryEvent::AttachRejected);
            return Err(AttachError::CapacityExhausted);
        }

        self.pins.set_output_mode(pin);
        self.pins.set_level(pin, PinLevel::Low);

        let slot = self
            .table
            .claim(pin)
            .ok_or(AttachError::CapacityExhausted)?;
        self.telemetry
            .record(TelemetryEvent::ChannelAttached { slot });
        Ok(slot)
    }

    /// Frees `slot`, removing it from the cyclic order.
    pub(crate) fn release(&mut self, slot: SlotId) {
        self.timer.disarm();
        self.table.release(slot);
        self.telemetry
            .record(TelemetryEvent::ChannelDetached { slot });
        self.reschedule();
    }

    /// Stores a new pulse width for an occupied slot and reschedules.
    ///
    /// Vacant slots are ignored and leave the timer untouched.
    pub fn set_pulse_width(&mut self, slot: SlotId, pulse_width_us: u16) {
        if self.table.pin(slot).is_none() {
            return;
        }

        self.timer.disarm();
        self.table.set_pulse_width(slot, pulse_width_us);
        self.telemetry.record(TelemetryEvent::PulseWidthChanged {
            slot,
            pulse_width_us,
        });
        self.reschedule();
    }

    /// Rebuilds the schedule and re-arms the timer for the current slot.
    ///
    /// Callers must have disarmed the timer before mutating the table.
    fn reschedule(&mut self) {
        self.schedule.rebuild(&self.table);

        let delay = self.schedule.delay(self.current, &self.config);
        if self.schedule.is_idle() || delay.is_zero() {
            self.telemetry.record(TelemetryEvent::TimerDisarmed);
            return;
        }

        self.timer.arm(delay, true);
        self.telemetry.record(TelemetryEvent::TimerArmed {
            slot: self.current,
            delay,
        });
    }

    /// Timer expiry handler.
    ///
    /// Re-arms the timer for the current slot's delay before emitting, so the
    /// cadence follows the schedule rather than the timer's own period. The
    /// high phase of the pulse is a blocking wait.
    pub fn on_timer(&mut self) -> EmitOutcome {
        let slot = self.current;
        let next_in = self.schedule.delay(slot, &self.config);

        if self.schedule.is_idle() || next_in.is_zero() {
            self.timer.disarm();
            self.telemetry.record(TelemetryEvent::TimerDisarmed);
            return EmitOutcome::Idle;
        }

        self.timer.disarm();
        self.timer.arm(next_in, true);

        let target = self
            .table
            .get(slot)
            .filter(|_| self.table.is_active(slot))
            .and_then(|entry| entry.pin.map(|pin| (pin, entry.pulse_width_us)));

        let outcome = match target {
            Some((pin, pulse_width_us)) => {
                self.pins.set_level(pin, PinLevel::High);
                self.delay.busy_wait_us(u32::from(pulse_width_us));
                self.pins.set_level(pin, PinLevel::Low);
                self.telemetry.record(TelemetryEvent::PulseEmitted {
                    slot,
                    pulse_width_us,
                });
                EmitOutcome::Pulsed {
                    slot,
                    pulse_width_us,
                    next_in,
                }
            }
            None => {
                self.telemetry.record(TelemetryEvent::TurnSkipped { slot });
                EmitOutcome::Skipped { slot, next_in }
            }
        };

        self.current = self.schedule.next(slot);
        outcome
    }
}
