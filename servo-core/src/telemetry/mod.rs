//! Telemetry events emitted by the pulse scheduler.
//!
//! Every table mutation and every emitter invocation reports a
//! [`TelemetryEvent`] through a [`TelemetrySink`]. Targets decide what to do
//! with them: the firmware mirrors them to defmt, the emulator keeps them in a
//! [`TelemetryRing`] and prints them, and tests inspect the ring directly.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::channels::SlotId;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Default number of records retained by a [`TelemetryRing`].
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated scheduler events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEvent {
    ChannelAttached { slot: SlotId },
    ChannelDetached { slot: SlotId },
    AttachRejected,
    PulseWidthChanged { slot: SlotId, pulse_width_us: u16 },
    TimerArmed { slot: SlotId, delay: Duration },
    TimerDisarmed,
    PulseEmitted { slot: SlotId, pulse_width_us: u16 },
    TurnSkipped { slot: SlotId },
}

impl TelemetryEvent {
    /// Short label used by log sinks.
    pub const fn label(&self) -> &'static str {
        match self {
            TelemetryEvent::ChannelAttached { .. } => "attached",
            TelemetryEvent::ChannelDetached { .. } => "detached",
            TelemetryEvent::AttachRejected => "attach-rejected",
            TelemetryEvent::PulseWidthChanged { .. } => "width",
            TelemetryEvent::TimerArmed { .. } => "armed",
            TelemetryEvent::TimerDisarmed => "disarmed",
            TelemetryEvent::PulseEmitted { .. } => "pulse",
            TelemetryEvent::TurnSkipped { .. } => "skip",
        }
    }

    /// Returns `true` for events raised from the emitter's hot path.
    pub const fn is_emitter_event(&self) -> bool {
        matches!(
            self,
            TelemetryEvent::PulseEmitted { .. } | TelemetryEvent::TurnSkipped { .. }
        )
    }
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label();
        match self {
            TelemetryEvent::ChannelAttached { slot }
            | TelemetryEvent::ChannelDetached { slot }
            | TelemetryEvent::TurnSkipped { slot } => write!(f, "{label} {slot}"),
            TelemetryEvent::PulseWidthChanged {
                slot,
                pulse_width_us,
            }
            | TelemetryEvent::PulseEmitted {
                slot,
                pulse_width_us,
            } => write!(f, "{label} {slot} {pulse_width_us}us"),
            TelemetryEvent::TimerArmed { slot, delay } => {
                write!(f, "{label} {slot} in {}us", delay.as_micros())
            }
            TelemetryEvent::AttachRejected | TelemetryEvent::TimerDisarmed => f.write_str(label),
        }
    }
}

/// Destination for scheduler telemetry.
pub trait TelemetrySink {
    /// Records a single event.
    fn record(&mut self, event: TelemetryEvent);
}

impl<T> TelemetrySink for &mut T
where
    T: TelemetrySink + ?Sized,
{
    fn record(&mut self, event: TelemetryEvent) {
        (**self).record(event);
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTelemetry;

impl NoopTelemetry {
    /// Creates a new no-op sink.
    pub const fn new() -> Self {
        Self
    }
}

impl TelemetrySink for NoopTelemetry {
    fn record(&mut self, _: TelemetryEvent) {}
}

/// Chronological iterator over a [`TelemetryRing`].
pub type OldestRecords<'a> = OldestOrdered<'a, TelemetryRecord>;

/// Event stored in a [`TelemetryRing`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: TelemetryEvent,
}

/// Fixed-capacity ring of the most recent events.
pub struct TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRing<CAPACITY> {
    /// Creates an empty ring.
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns the most recent record, if any.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Iterates over retained records in chronological order.
    pub fn oldest_first(&self) -> OldestRecords<'_> {
        self.ring.oldest_ordered()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next record will receive.
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRing<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TelemetrySink for TelemetryRing<CAPACITY> {
    fn record(&mut self, event: TelemetryEvent) {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, event });
    }
}
