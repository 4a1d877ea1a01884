// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Radar track message layout.
//!
//! The radar reports one detection per CAN message across a fixed block of
//! consecutive identifiers.  A sweep is complete once the last identifier of
//! the block has been received.

use std::fmt;

/// First CAN identifier of the radar track block.
pub const RADAR_START_ADDR: u32 = 0x500;

/// Number of track messages in one sweep.
pub const RADAR_MSG_COUNT: usize = 32;

/// The final message of the sweep, its arrival completes the sweep.
pub const TRIGGER_ADDR: u32 = RADAR_START_ADDR + RADAR_MSG_COUNT as u32 - 1;

/// Expected rate of every track message in Hz.
pub const RADAR_MSG_FREQUENCY: u64 = 50;

/// Returns the slot index for a CAN identifier inside the sweep block.
pub fn slot(addr: u32) -> Option<usize> {
    addr.checked_sub(RADAR_START_ADDR)
        .map(|offset| offset as usize)
        .filter(|&offset| offset < RADAR_MSG_COUNT)
}

/// All addresses of the sweep in ascending order.
pub fn addresses() -> impl Iterator<Item = u32> {
    RADAR_START_ADDR..RADAR_START_ADDR + RADAR_MSG_COUNT as u32
}

/// Signals carried by every radar track message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Detection state, 3 when a valid detection is present
    State,
    /// Azimuth angle in degrees
    Azimuth,
    /// Longitudinal distance in meters
    LongDist,
    /// Relative acceleration in m/s²
    RelAccel,
    /// Relative speed in m/s
    RelSpeed,
}

impl Signal {
    /// Every signal of a track message.
    pub const ALL: [Signal; 5] = [
        Signal::State,
        Signal::Azimuth,
        Signal::LongDist,
        Signal::RelAccel,
        Signal::RelSpeed,
    ];
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Signal::State => write!(f, "STATE"),
            Signal::Azimuth => write!(f, "AZIMUTH"),
            Signal::LongDist => write!(f, "LONG_DIST"),
            Signal::RelAccel => write!(f, "REL_ACCEL"),
            Signal::RelSpeed => write!(f, "REL_SPEED"),
        }
    }
}

/// Set of sweep addresses, one bit per slot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepSet(u32);

impl SweepSet {
    /// An empty set.
    pub const fn new() -> Self {
        SweepSet(0)
    }

    /// Adds an address, returns false if it lies outside the sweep.
    pub fn insert(&mut self, addr: u32) -> bool {
        match slot(addr) {
            Some(i) => {
                self.0 |= 1 << i;
                true
            }
            None => false,
        }
    }

    /// True if the address is in the set.
    pub fn contains(&self, addr: u32) -> bool {
        slot(addr).is_some_and(|i| self.0 & (1 << i) != 0)
    }

    /// Adds every address of `other` to this set.
    pub fn union(&mut self, other: SweepSet) {
        self.0 |= other.0;
    }

    /// Removes every address.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// True if no address is in the set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        addresses().filter(|&addr| self.contains(addr))
    }
}

impl FromIterator<u32> for SweepSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut set = SweepSet::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}
