//! Cyclic successor table over the active channels.
//!
//! For every slot the schedule records which active slot the emitter visits
//! next and how many refresh quanta separate the two visits. Inactive slots are
//! skipped, and their quanta fold into the delay of the preceding visit, so a
//! full traversal always spans `N` quanta regardless of how many channels are
//! active. The table is rebuilt from scratch on each mutation; with a handful of
//! slots the quadratic scan is cheaper than maintaining it incrementally.

use core::time::Duration;

use heapless::Vec;

use crate::channels::{ChannelTable, MAX_CHANNELS, SlotId};

/// Default spacing between two successive slot visits.
pub const REFRESH_QUANTUM: Duration = Duration::from_millis(5);

/// Scheduling parameters shared by every channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SchedulerConfig {
    refresh_quantum: Duration,
}

impl SchedulerConfig {
    /// Creates a configuration with the provided quantum.
    pub const fn new(refresh_quantum: Duration) -> Self {
        Self { refresh_quantum }
    }

    /// Returns the spacing between two successive slot visits.
    pub const fn refresh_quantum(&self) -> Duration {
        self.refresh_quantum
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(REFRESH_QUANTUM)
    }
}

/// Successor and delay per slot, derived from a [`ChannelTable`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schedule<const N: usize = MAX_CHANNELS> {
    next: [u8; N],
    delay_quanta: [u32; N],
    active_count: usize,
}

impl<const N: usize> Schedule<N> {
    /// Initial schedule: every slot hands over to its neighbour after one quantum.
    pub fn new() -> Self {
        Self {
            next: core::array::from_fn(|index| u8::try_from((index + 1) % N).unwrap_or(0)),
            delay_quanta: [1; N],
            active_count: 0,
        }
    }

    /// Builds a schedule for `table` starting from the initial successor layout.
    pub fn build<P>(table: &ChannelTable<P, N>) -> Self
    where
        P: Copy + Eq,
    {
        let mut schedule = Self::new();
        schedule.rebuild(table);
        schedule
    }

    /// Recomputes every successor and delay from the table.
    ///
    /// A slot with no active successor keeps its previous `next` entry and is
    /// given a full-cycle delay. Returns the resulting active count.
    pub fn rebuild<P>(&mut self, table: &ChannelTable<P, N>) -> usize
    where
        P: Copy + Eq,
    {
        let mut found = 0;
        let full_cycle = u32::try_from(N).unwrap_or(u32::MAX);

        for index in 0..N {
            let successor = (1..=N)
                .map(|distance| (distance, (index + distance) % N))
                .find(|&(_, candidate)| table.is_active_index(candidate));

            match successor {
                Some((distance, candidate)) => {
                    self.next[index] = u8::try_from(candidate).unwrap_or(self.next[index]);
                    self.delay_quanta[index] = u32::try_from(distance).unwrap_or(full_cycle);
                    found += 1;
                }
                None => {
                    self.delay_quanta[index] = full_cycle;
                }
            }
        }

        self.active_count = found;
        found
    }

    /// Slot the emitter moves to after visiting `slot`.
    pub fn next(&self, slot: SlotId) -> SlotId {
        match self.next.get(slot.index()) {
            Some(&next) => SlotId::new(next),
            None => SlotId::new(0),
        }
    }

    /// Number of quanta between visiting `slot` and visiting its successor.
    ///
    /// Out-of-range slots report zero, which the emitter treats as invalid.
    pub fn delay_quanta(&self, slot: SlotId) -> u32 {
        self.delay_quanta.get(slot.index()).copied().unwrap_or(0)
    }

    /// Wall-clock delay between visiting `slot` and visiting its successor.
    pub fn delay(&self, slot: SlotId, config: &SchedulerConfig) -> Duration {
        config.refresh_quantum() * self.delay_quanta(slot)
    }

    /// Number of slots that found an active successor; zero means idle.
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Returns `true` when nothing is left to pulse.
    pub const fn is_idle(&self) -> bool {
        self.active_count == 0
    }

    /// Follows the successor chain from `start` until it revisits a slot.
    pub fn visit_order(&self, start: SlotId) -> Vec<SlotId, N> {
        let mut order = Vec::new();
        let mut cursor = start;
        while !order.contains(&cursor) {
            if order.push(cursor).is_err() {
                break;
            }
            cursor = self.next(cursor);
        }
        order
    }
}

impl<const N: usize> Default for Schedule<N> {
    fn default() -> Self {
        Self::new()
    }
}
