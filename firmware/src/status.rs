#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The pulse task and the application task publish counters here so either
//! side can report scheduler health without taking the scheduler lock.

use portable_atomic::{AtomicU32, Ordering};
use servo_core::scheduler::EmitOutcome;

/// Pulses emitted since boot.
static PULSES_EMITTED: AtomicU32 = AtomicU32::new(0);
/// Turns consumed by a slot with nothing to pulse.
static TURNS_SKIPPED: AtomicU32 = AtomicU32::new(0);
/// Expiries that found the schedule idle and disarmed.
static IDLE_EXPIRIES: AtomicU32 = AtomicU32::new(0);
/// Active-set bitmask as of the last table mutation.
static ACTIVE_MASK: AtomicU32 = AtomicU32::new(0);
/// Width of the most recent pulse (µs).
static LAST_PULSE_US: AtomicU32 = AtomicU32::new(0);

/// Point-in-time view of the counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub pulses_emitted: u32,
    pub turns_skipped: u32,
    pub idle_expiries: u32,
    pub active_mask: u32,
    pub last_pulse_us: u32,
}

impl StatusSnapshot {
    /// Number of channels currently in the active set.
    pub const fn active_channels(&self) -> u32 {
        self.active_mask.count_ones()
    }
}

/// Folds one emitter invocation into the counters.
pub fn record_outcome(outcome: &EmitOutcome) {
    match outcome {
        EmitOutcome::Pulsed { pulse_width_us, .. } => {
            PULSES_EMITTED.fetch_add(1, Ordering::Relaxed);
            LAST_PULSE_US.store(u32::from(*pulse_width_us), Ordering::Relaxed);
        }
        EmitOutcome::Skipped { .. } => {
            TURNS_SKIPPED.fetch_add(1, Ordering::Relaxed);
        }
        EmitOutcome::Idle => {
            IDLE_EXPIRIES.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Publishes the active-set bitmask.
pub fn record_active_mask(mask: u32) {
    ACTIVE_MASK.store(mask, Ordering::Relaxed);
}

/// Reads every counter.
pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        pulses_emitted: PULSES_EMITTED.load(Ordering::Relaxed),
        turns_skipped: TURNS_SKIPPED.load(Ordering::Relaxed),
        idle_expiries: IDLE_EXPIRIES.load(Ordering::Relaxed),
        active_mask: ACTIVE_MASK.load(Ordering::Relaxed),
        last_pulse_us: LAST_PULSE_US.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use servo_core::channels::SlotId;

    use super::*;

    #[test]
    fn outcomes_accumulate_into_snapshot() {
        let before = snapshot();

        record_outcome(&EmitOutcome::Pulsed {
            slot: SlotId::new(0),
            pulse_width_us: 1_250,
            next_in: Duration::from_millis(5),
        });
        record_outcome(&EmitOutcome::Skipped {
            slot: SlotId::new(1),
            next_in: Duration::from_millis(15),
        });
        record_outcome(&EmitOutcome::Idle);
        record_active_mask(0b0101);

        let after = snapshot();
        assert_eq!(after.pulses_emitted - before.pulses_emitted, 1);
        assert_eq!(after.turns_skipped - before.turns_skipped, 1);
        assert_eq!(after.idle_expiries - before.idle_expiries, 1);
        assert_eq!(after.last_pulse_us, 1_250);
        assert_eq!(after.active_channels(), 2);
    }
}
