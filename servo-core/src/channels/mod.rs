//! Channel table shared by every servo handle.
//!
//! The table is a fixed array of slots plus a bitmask describing which slots
//! currently carry a pulse. Handles claim slots by ascending index and refer to
//! them only through [`SlotId`]; the pins themselves stay owned by the
//! scheduler's [`OutputPins`](crate::hal::OutputPins) implementation.

use core::fmt;

/// Default number of channels multiplexed onto the shared timer.
pub const MAX_CHANNELS: usize = 4;

/// Uncalibrated default for the shortest pulse sent to a servo (µs).
pub const DEFAULT_MIN_PULSE_WIDTH_US: u16 = 1_000;

/// Uncalibrated default for the longest pulse sent to a servo (µs).
pub const DEFAULT_MAX_PULSE_WIDTH_US: u16 = 2_000;

/// Pulse width a slot holds when it is claimed or released (µs).
pub const DEFAULT_NEUTRAL_PULSE_WIDTH_US: u16 = 1_500;

/// Lowest calibration bound accepted at attach time (µs).
pub const PULSE_WIDTH_FLOOR_US: u16 = 200;

/// Highest calibration bound accepted at attach time (µs).
pub const PULSE_WIDTH_CEILING_US: u16 = 3_000;

/// Smallest value the upper calibration bound may take (µs).
pub const MIN_MAX_PULSE_WIDTH_US: u16 = 250;

/// Index of a slot in the [`ChannelTable`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SlotId(u8);

impl SlotId {
    /// Wraps a raw slot index.
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Returns the slot index as a `usize` suitable for table lookups.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    const fn bit(self) -> u32 {
        1 << self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Per-handle calibration range for pulse widths.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseBounds {
    pub min_us: u16,
    pub max_us: u16,
}

impl PulseBounds {
    /// Builds bounds after applying the calibration clamp:
    /// `max_us` lands in `[250, 3000]`, then `min_us` in `[200, max_us]`.
    pub fn clamped(min_us: u16, max_us: u16) -> Self {
        let max_us = max_us.clamp(MIN_MAX_PULSE_WIDTH_US, PULSE_WIDTH_CEILING_US);
        let min_us = min_us.min(max_us).max(PULSE_WIDTH_FLOOR_US);
        Self { min_us, max_us }
    }

    /// Clamps an arbitrary microsecond value into the range.
    pub fn clamp(&self, micros: i32) -> u16 {
        let clamped = micros.clamp(i32::from(self.min_us), i32::from(self.max_us));
        // Both ends fit in u16, so the conversion cannot fail.
        u16::try_from(clamped).unwrap_or(self.max_us)
    }
}

impl Default for PulseBounds {
    fn default() -> Self {
        Self {
            min_us: DEFAULT_MIN_PULSE_WIDTH_US,
            max_us: DEFAULT_MAX_PULSE_WIDTH_US,
        }
    }
}

/// A single schedulable output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelSlot<P> {
    pub pin: Option<P>,
    pub pulse_width_us: u16,
}

impl<P> ChannelSlot<P> {
    /// Slot with no pin and a neutral pulse width.
    pub const VACANT: Self = Self {
        pin: None,
        pulse_width_us: DEFAULT_NEUTRAL_PULSE_WIDTH_US,
    };

    /// Returns `true` when no handle owns the slot.
    pub const fn is_vacant(&self) -> bool {
        self.pin.is_none()
    }
}

/// Fixed-size registry of channel slots.
#[derive(Clone, Debug)]
pub struct ChannelTable<P, const N: usize = MAX_CHANNELS> {
    slots: [ChannelSlot<P>; N],
    active_mask: u32,
}

impl<P, const N: usize> ChannelTable<P, N>
where
    P: Copy + Eq,
{
    const CAPACITY_FITS_MASK: () = assert!(N > 0 && N <= 32, "channel count must be 1..=32");

    /// Creates a table with every slot vacant.
    pub const fn new() -> Self {
        let () = Self::CAPACITY_FITS_MASK;
        Self {
            slots: [ChannelSlot::VACANT; N],
            active_mask: 0,
        }
    }

    /// Number of slots in the table.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Claims the lowest-indexed vacant slot for `pin`.
    ///
    /// The claimed slot starts with a neutral width and stays out of the
    /// active set until a width is written.
    pub fn claim(&mut self, pin: P) -> Option<SlotId> {
        let index = self.slots.iter().position(ChannelSlot::is_vacant)?;
        let slot = SlotId::new(u8::try_from(index).ok()?);
        self.slots[index] = ChannelSlot {
            pin: Some(pin),
            pulse_width_us: DEFAULT_NEUTRAL_PULSE_WIDTH_US,
        };
        self.active_mask &= !slot.bit();
        Some(slot)
    }

    /// Returns the slot to the vacant pool and removes it from the active set.
    pub fn release(&mut self, slot: SlotId) {
        if let Some(entry) = self.slots.get_mut(slot.index()) {
            *entry = ChannelSlot::VACANT;
            self.active_mask &= !slot.bit();
        }
    }

    /// Stores a new width for an occupied slot and marks it active.
    ///
    /// Returns `false` when the slot is vacant or out of range.
    pub fn set_pulse_width(&mut self, slot: SlotId, pulse_width_us: u16) -> bool {
        match self.slots.get_mut(slot.index()) {
            Some(entry) if !entry.is_vacant() => {
                entry.pulse_width_us = pulse_width_us;
                self.active_mask |= slot.bit();
                true
            }
            _ => false,
        }
    }

    /// Looks up a slot by identifier.
    pub fn get(&self, slot: SlotId) -> Option<&ChannelSlot<P>> {
        self.slots.get(slot.index())
    }

    /// Pin assigned to the slot, if any.
    pub fn pin(&self, slot: SlotId) -> Option<P> {
        self.get(slot).and_then(|entry| entry.pin)
    }

    /// Last width written to the slot.
    pub fn pulse_width(&self, slot: SlotId) -> Option<u16> {
        self.get(slot).map(|entry| entry.pulse_width_us)
    }

    /// Returns `true` when the slot at `index` has a pin and its active bit set.
    pub fn is_active_index(&self, index: usize) -> bool {
        match self.slots.get(index) {
            Some(entry) => !entry.is_vacant() && self.active_mask & (1 << index) != 0,
            None => false,
        }
    }

    /// Returns `true` when the slot should be pulsed.
    pub fn is_active(&self, slot: SlotId) -> bool {
        self.is_active_index(slot.index())
    }

    /// Raw active-set bitmask (bit `i` set for slot `i`).
    pub const fn active_mask(&self) -> u32 {
        self.active_mask
    }

    /// Number of slots currently claimed by a handle.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|entry| !entry.is_vacant()).count()
    }

    /// Returns `true` when every slot is claimed.
    pub fn is_full(&self) -> bool {
        self.occupied() == N
    }

    /// Iterates over all slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ChannelSlot<P>)> {
        self.slots
            .iter()
            .enumerate()
            .zip(0..)
            .map(|((_, entry), index)| (SlotId::new(index), entry))
    }
}

impl<P, const N: usize> Default for ChannelTable<P, N>
where
    P: Copy + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}
