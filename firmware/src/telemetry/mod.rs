//! Scheduler telemetry for the firmware target.
//!
//! [`DefmtTelemetry`] keeps the shared ring of recent scheduler events and
//! mirrors table changes to defmt (or stdout on the host) for bring-up.
//! Emitter events arrive every refresh quantum, so they are only logged when
//! explicitly requested.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use servo_core::telemetry::{
    EventId, OldestRecords, TelemetryEvent, TelemetryRecord, TelemetryRing, TelemetrySink,
};

/// Number of scheduler events retained on the MCU.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Ring-backed sink that also logs every table mutation.
pub struct DefmtTelemetry {
    ring: TelemetryRing<TELEMETRY_RING_CAPACITY>,
    log_emitter_events: bool,
}

impl DefmtTelemetry {
    /// Creates a sink that logs table changes only.
    pub const fn new() -> Self {
        Self {
            ring: TelemetryRing::new(),
            log_emitter_events: false,
        }
    }

    /// Also logs every pulse and skipped turn.
    pub const fn verbose() -> Self {
        Self {
            ring: TelemetryRing::new(),
            log_emitter_events: true,
        }
    }

    /// Returns the most recent record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.latest()
    }

    /// Returns the recorded events in chronological order.
    pub fn oldest_first(&self) -> OldestRecords<'_> {
        self.ring.oldest_first()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }
}

impl Default for DefmtTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for DefmtTelemetry {
    fn record(&mut self, event: TelemetryEvent) {
        let id = self.ring.next_event_id();
        self.ring.record(event);
        if self.log_emitter_events || !event.is_emitter_event() {
            emit_log(id, &event);
        }
    }
}

#[cfg(target_os = "none")]
fn emit_log(id: EventId, event: &TelemetryEvent) {
    match *event {
        TelemetryEvent::ChannelAttached { slot } | TelemetryEvent::ChannelDetached { slot } => {
            defmt::info!("telemetry:servo #{} {} ch{}", id, event.label(), slot.index());
        }
        TelemetryEvent::AttachRejected => {
            defmt::warn!("telemetry:servo #{} {}", id, event.label());
        }
        TelemetryEvent::PulseWidthChanged {
            slot,
            pulse_width_us,
        }
        | TelemetryEvent::PulseEmitted {
            slot,
            pulse_width_us,
        } => {
            defmt::info!(
                "telemetry:servo #{} {} ch{} {}us",
                id,
                event.label(),
                slot.index(),
                pulse_width_us
            );
        }
        TelemetryEvent::TimerArmed { slot, delay } => {
            defmt::debug!(
                "telemetry:servo #{} {} ch{} in {}us",
                id,
                event.label(),
                slot.index(),
                u64::try_from(delay.as_micros()).unwrap_or(u64::MAX)
            );
        }
        TelemetryEvent::TimerDisarmed => {
            defmt::debug!("telemetry:servo #{} {}", id, event.label());
        }
        TelemetryEvent::TurnSkipped { slot } => {
            defmt::trace!("telemetry:servo #{} {} ch{}", id, event.label(), slot.index());
        }
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: EventId, event: &TelemetryEvent) {
    println!("telemetry:servo #{id} {event}");
}
