// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::sweep::{slot, Signal, SweepSet, RADAR_MSG_COUNT, RADAR_MSG_FREQUENCY};
use log::{debug, trace, warn};

/// Consecutive unhealthy batches before the bus is reported invalid.
const CAN_INVALID_CNT: u32 = 5;

/// A message is stale once it has been missing for this many periods.
const TIMEOUT_PERIODS: u64 = 10;

/// Raw CAN message as received from the radar bus.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Packet {
    /// CAN message ID
    pub id: u32,
    /// 8-byte data payload as u64
    pub data: u64,
    /// Monotonic receive time in nanoseconds
    pub timestamp: u64,
}

/// Loads an 8-byte little-endian payload, shorter payloads are zero padded.
pub fn load_data(data: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = data.len().min(8);
    buf[..n].copy_from_slice(&data[..n]);
    u64::from_le_bytes(buf)
}

/// Bit placement and scaling of one signal inside the payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalLayout {
    /// Position of the least significant bit
    pub start: u32,
    /// Width in bits
    pub length: u32,
    /// Two's complement encoding
    pub signed: bool,
    /// Scale from raw to physical value
    pub factor: f64,
}

impl SignalLayout {
    /// Layout of each signal in the radar track messages (Intel byte order).
    pub const fn of(signal: Signal) -> SignalLayout {
        match signal {
            Signal::State => SignalLayout {
                start: 0,
                length: 3,
                signed: false,
                factor: 1.0,
            },
            Signal::Azimuth => SignalLayout {
                start: 12,
                length: 10,
                signed: true,
                factor: 0.2,
            },
            Signal::LongDist => SignalLayout {
                start: 24,
                length: 12,
                signed: false,
                factor: 0.05,
            },
            Signal::RelAccel => SignalLayout {
                start: 36,
                length: 10,
                signed: true,
                factor: 0.02,
            },
            Signal::RelSpeed => SignalLayout {
                start: 48,
                length: 14,
                signed: true,
                factor: 0.01,
            },
        }
    }

    /// Extracts the raw integer value, sign extended when the signal is signed.
    pub fn raw(&self, data: u64) -> i64 {
        let mask = (1u64 << self.length) - 1;
        let raw = (data >> self.start) & mask;
        if self.signed && raw & (1 << (self.length - 1)) != 0 {
            raw as i64 - (1i64 << self.length)
        } else {
            raw as i64
        }
    }

    /// Extracts the physical value.
    pub fn value(&self, data: u64) -> f64 {
        self.raw(data) as f64 * self.factor
    }
}

/// Latest decoded values of one radar track message.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackMessage {
    /// Detection state, 3 when a valid detection is present
    pub state: u8,
    /// Azimuth angle in degrees
    pub azimuth: f64,
    /// Longitudinal distance in meters
    pub long_dist: f64,
    /// Relative acceleration in m/s²
    pub rel_accel: f64,
    /// Relative speed in m/s
    pub rel_speed: f64,
}

impl TrackMessage {
    /// Value of one signal.
    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::State => self.state as f64,
            Signal::Azimuth => self.azimuth,
            Signal::LongDist => self.long_dist,
            Signal::RelAccel => self.rel_accel,
            Signal::RelSpeed => self.rel_speed,
        }
    }
}

impl From<u64> for TrackMessage {
    fn from(data: u64) -> Self {
        TrackMessage {
            state: SignalLayout::of(Signal::State).raw(data) as u8,
            azimuth: SignalLayout::of(Signal::Azimuth).value(data),
            long_dist: SignalLayout::of(Signal::LongDist).value(data),
            rel_accel: SignalLayout::of(Signal::RelAccel).value(data),
            rel_speed: SignalLayout::of(Signal::RelSpeed).value(data),
        }
    }
}

/// Latest values for every message of the sweep, indexed by slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalTable {
    messages: [TrackMessage; RADAR_MSG_COUNT],
}

impl SignalTable {
    /// Returns the message for a sweep address, None outside the sweep.
    pub fn message(&self, addr: u32) -> Option<&TrackMessage> {
        slot(addr).map(|i| &self.messages[i])
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, addr: u32, message: TrackMessage) -> bool {
        match slot(addr) {
            Some(i) => {
                self.messages[i] = message;
                true
            }
            None => false,
        }
    }
}

/// Source of decoded radar signals consumed by the tracker.
pub trait SignalDecoder {
    /// Decodes a batch of packets and returns the sweep addresses it refreshed.
    fn decode(&mut self, packets: &[Packet]) -> SweepSet;

    /// Current values of every sweep message.
    fn signals(&self) -> &SignalTable;

    /// False while the bus is degraded (missing or late messages).
    fn can_valid(&self) -> bool;
}

/// Decoder for the radar track messages with a per-message refresh check.
#[derive(Debug, Clone)]
pub struct RadarDecoder {
    table: SignalTable,
    last_seen: [Option<u64>; RADAR_MSG_COUNT],
    timeout: u64,
    now: u64,
    invalid_cnt: u32,
}

impl Default for RadarDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RadarDecoder {
    /// Creates a decoder with every message unseen and the bus invalid.
    pub fn new() -> Self {
        RadarDecoder {
            table: SignalTable::default(),
            last_seen: [None; RADAR_MSG_COUNT],
            timeout: TIMEOUT_PERIODS * 1_000_000_000 / RADAR_MSG_FREQUENCY,
            now: 0,
            invalid_cnt: CAN_INVALID_CNT,
        }
    }

    fn is_stale(&self, last_seen: Option<u64>) -> bool {
        match last_seen {
            Some(ts) => self.now.saturating_sub(ts) > self.timeout,
            None => true,
        }
    }
}

impl SignalDecoder for RadarDecoder {
    fn decode(&mut self, packets: &[Packet]) -> SweepSet {
        let mut updated = SweepSet::new();
        if packets.is_empty() {
            return updated;
        }

        for pkt in packets {
            let Some(i) = slot(pkt.id) else {
                continue;
            };

            let message = TrackMessage::from(pkt.data);
            trace!("{:#x} {:?}", pkt.id, message);

            self.table.messages[i] = message;
            self.last_seen[i] = Some(pkt.timestamp);
            self.now = self.now.max(pkt.timestamp);
            updated.insert(pkt.id);
        }

        let was_valid = self.can_valid();
        let stale = self
            .last_seen
            .iter()
            .filter(|&&last_seen| self.is_stale(last_seen))
            .count();

        if stale > 0 {
            self.invalid_cnt = (self.invalid_cnt + 1).min(CAN_INVALID_CNT);
        } else {
            self.invalid_cnt = 0;
        }

        match (was_valid, self.can_valid()) {
            (true, false) => warn!("radar bus invalid: {} stale messages", stale),
            (false, true) => debug!("radar bus valid"),
            _ => (),
        }

        updated
    }

    fn signals(&self) -> &SignalTable {
        &self.table
    }

    fn can_valid(&self) -> bool {
        self.invalid_cnt < CAN_INVALID_CNT
    }
}
