// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    decoder::{Packet, SignalDecoder},
    sweep::{addresses, slot, SweepSet, RADAR_MSG_COUNT, TRIGGER_ADDR},
};
use log::{debug, trace};
use std::{fmt, time::Duration};

/// STATE value reported for a valid detection.
pub const VALID_STATE: u8 = 3;

/// Control loop period, `RadarTracker::update` is called once per cycle with
/// every packet received since the previous cycle.
pub const CYCLE_PERIOD: Duration = Duration::from_millis(10);

/// Soft errors reported alongside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarError {
    /// The radar bus is degraded, messages are missing or late
    CanError,
}

impl fmt::Display for RadarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RadarError::CanError => write!(f, "canError"),
        }
    }
}

/// A detection tracked at one sweep address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarPoint {
    /// Identity of this detection lifetime, never reused
    pub track_id: u64,
    /// True while the last decode of the address was valid
    pub measured: bool,
    /// Longitudinal distance in meters
    pub d_rel: f64,
    /// Lateral offset in meters
    pub y_rel: f64,
    /// Relative speed in m/s
    pub v_rel: f64,
    /// Relative acceleration in m/s²
    pub a_rel: f64,
    /// Lateral speed, always NaN as the radar does not measure it
    pub yv_rel: f64,
}

impl RadarPoint {
    fn new(track_id: u64) -> Self {
        RadarPoint {
            track_id,
            measured: false,
            d_rel: 0.0,
            y_rel: 0.0,
            v_rel: 0.0,
            a_rel: 0.0,
            yv_rel: f64::NAN,
        }
    }
}

/// Snapshot of every live detection after a completed sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadarData {
    /// Soft errors of this sweep
    pub errors: Vec<RadarError>,
    /// Live detections in ascending address order
    pub points: Vec<RadarPoint>,
}

/// Lateral offset of a detection from its azimuth (degrees) and range.
pub fn lateral_offset(azimuth: f64, long_dist: f64) -> f64 {
    0.5 * -azimuth.to_radians().sin() * long_dist
}

/// Tracks the detections reported across the radar sweep.
///
/// Each sweep address owns at most one point.  A point lives while its
/// address keeps reporting a valid detection and is dropped on the first
/// invalid one, a later detection at the same address gets a new track id.
#[derive(Debug)]
pub struct RadarTracker<D> {
    decoder: Option<D>,
    radar_off_can: bool,
    updated: SweepSet,
    points: [Option<RadarPoint>; RADAR_MSG_COUNT],
    track_id: u64,
}

impl<D: SignalDecoder> RadarTracker<D> {
    /// Creates a tracker, `decoder` is None when the vehicle carries no radar.
    pub fn new(radar_off_can: bool, decoder: Option<D>) -> Self {
        debug!(
            "radar tracker radar_off_can={} decoder={}",
            radar_off_can,
            decoder.is_some()
        );

        RadarTracker {
            decoder,
            radar_off_can,
            updated: SweepSet::new(),
            points: [None; RADAR_MSG_COUNT],
            track_id: 0,
        }
    }

    /// True when the tracker never produces detections.
    pub fn is_disabled(&self) -> bool {
        self.radar_off_can || self.decoder.is_none()
    }

    /// Feeds one cycle of CAN packets.
    ///
    /// Returns None until the trigger message has been received since the
    /// previous snapshot.  A disabled tracker returns an empty snapshot for
    /// every call without touching the decoder.
    pub fn update(&mut self, packets: &[Packet]) -> Option<RadarData> {
        let decoder = match (&mut self.decoder, self.radar_off_can) {
            (Some(decoder), false) => decoder,
            _ => return Some(RadarData::default()),
        };

        self.updated.union(decoder.decode(packets));

        if !self.updated.contains(TRIGGER_ADDR) {
            return None;
        }

        let data = self.resolve();
        self.updated.clear();
        Some(data)
    }

    fn resolve(&mut self) -> RadarData {
        let mut data = RadarData::default();
        let Some(decoder) = &self.decoder else {
            return data;
        };

        if !decoder.can_valid() {
            data.errors.push(RadarError::CanError);
        }

        let signals = decoder.signals();

        for addr in addresses() {
            let Some(i) = slot(addr) else {
                continue;
            };

            let point = self.points[i].get_or_insert_with(|| {
                let point = RadarPoint::new(self.track_id);
                self.track_id += 1;
                point
            });

            match signals.message(addr) {
                Some(msg) if msg.state == VALID_STATE => {
                    point.measured = true;
                    point.d_rel = msg.long_dist;
                    point.y_rel = lateral_offset(msg.azimuth, msg.long_dist);
                    point.v_rel = msg.rel_speed;
                    point.a_rel = msg.rel_accel;
                    point.yv_rel = f64::NAN;
                }
                _ => {
                    if point.measured {
                        trace!("{:#x} track {} lost", addr, point.track_id);
                    }
                    self.points[i] = None;
                }
            }
        }

        data.points = self.points.iter().flatten().copied().collect();
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decoder::{RadarDecoder, SignalTable, TrackMessage},
        sweep::RADAR_START_ADDR,
    };
    use std::collections::{HashMap, HashSet};

    /// Decoder fed directly with signal values, one batch per cycle.
    #[derive(Default)]
    struct ScriptedDecoder {
        table: SignalTable,
        can_valid: bool,
        calls: usize,
    }

    impl SignalDecoder for ScriptedDecoder {
        fn decode(&mut self, packets: &[Packet]) -> SweepSet {
            self.calls += 1;
            packets.iter().map(|pkt| pkt.id).collect()
        }

        fn signals(&self) -> &SignalTable {
            &self.table
        }

        fn can_valid(&self) -> bool {
            self.can_valid
        }
    }

    fn tracker() -> RadarTracker<ScriptedDecoder> {
        let decoder = ScriptedDecoder {
            can_valid: true,
            ..Default::default()
        };
        RadarTracker::new(false, Some(decoder))
    }

    fn set(tracker: &mut RadarTracker<ScriptedDecoder>, addr: u32, message: TrackMessage) {
        let decoder = tracker.decoder.as_mut().unwrap();
        assert!(decoder.table.set(addr, message));
    }

    fn valid(azimuth: f64, long_dist: f64) -> TrackMessage {
        TrackMessage {
            state: VALID_STATE,
            azimuth,
            long_dist,
            rel_accel: 0.0,
            rel_speed: 0.0,
        }
    }

    fn refresh(ids: &[u32]) -> Vec<Packet> {
        ids.iter()
            .map(|&id| Packet {
                id,
                ..Default::default()
            })
            .collect()
    }

    fn sweep() -> Vec<Packet> {
        refresh(&addresses().collect::<Vec<_>>())
    }

    fn point(data: &RadarData, track_id: u64) -> Option<&RadarPoint> {
        data.points.iter().find(|p| p.track_id == track_id)
    }

    #[test]
    fn test_not_ready_until_trigger() {
        let mut tracker = tracker();
        assert_eq!(tracker.update(&[]), None);
        assert_eq!(tracker.update(&refresh(&[0x500, 0x501])), None);
        assert_eq!(tracker.update(&refresh(&[0x51E])), None);
        assert!(tracker.update(&refresh(&[TRIGGER_ADDR])).is_some());

        // Pending set is cleared after each snapshot.
        assert_eq!(tracker.update(&refresh(&[0x500])), None);
        assert!(tracker.update(&refresh(&[TRIGGER_ADDR])).is_some());
    }

    #[test]
    fn test_scenario_point() {
        let mut tracker = tracker();
        set(
            &mut tracker,
            RADAR_START_ADDR,
            TrackMessage {
                state: VALID_STATE,
                azimuth: 30.0,
                long_dist: 50.0,
                rel_accel: 0.0,
                rel_speed: -2.0,
            },
        );

        let data = tracker.update(&sweep()).unwrap();
        assert!(data.errors.is_empty());
        assert_eq!(data.points.len(), 1);

        let p = data.points[0];
        assert_eq!(p.track_id, 0);
        assert!(p.measured);
        assert_eq!(p.d_rel, 50.0);
        assert!((p.y_rel - -12.5).abs() < 1e-9);
        assert_eq!(p.v_rel, -2.0);
        assert_eq!(p.a_rel, 0.0);
        assert!(p.yv_rel.is_nan());
    }

    #[test]
    fn test_lateral_offset() {
        for (azimuth, long_dist) in [(0.0, 10.0), (-45.0, 20.0), (90.0, 4.0), (12.6, 73.25)] {
            let expected = -0.5 * f64::to_radians(azimuth).sin() * long_dist;
            assert!((lateral_offset(azimuth, long_dist) - expected).abs() < 1e-12);
        }
        assert!((lateral_offset(90.0, 4.0) - -2.0).abs() < 1e-12);
        assert!((lateral_offset(-30.0, 10.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_point_refreshed_in_place() {
        let mut tracker = tracker();
        set(&mut tracker, 0x505, valid(0.0, 10.0));
        let first = tracker.update(&sweep()).unwrap();
        let id = first.points[0].track_id;

        set(&mut tracker, 0x505, valid(0.0, 12.0));
        let second = tracker.update(&sweep()).unwrap();
        assert_eq!(second.points.len(), 1);
        assert_eq!(second.points[0].track_id, id);
        assert_eq!(second.points[0].d_rel, 12.0);
    }

    #[test]
    fn test_invalid_removes_point() {
        let mut tracker = tracker();
        set(&mut tracker, 0x501, valid(5.0, 30.0));
        let data = tracker.update(&sweep()).unwrap();
        let first_id = data.points[0].track_id;
        assert!(tracker.points[1].is_some());

        set(&mut tracker, 0x501, TrackMessage::default());
        let data = tracker.update(&sweep()).unwrap();
        assert!(data.points.is_empty());
        assert!(tracker.points[1].is_none());

        set(&mut tracker, 0x501, valid(5.0, 30.0));
        let data = tracker.update(&sweep()).unwrap();
        assert_eq!(data.points.len(), 1);
        assert!(data.points[0].track_id > first_id);
        assert!(point(&data, first_id).is_none());
    }

    #[test]
    fn test_unrefreshed_slots_are_pruned() {
        let mut tracker = tracker();
        set(&mut tracker, 0x502, valid(0.0, 8.0));
        assert_eq!(tracker.update(&sweep()).unwrap().points.len(), 1);

        // Only the trigger is refreshed, the stale table still drives the
        // whole sweep.
        set(&mut tracker, 0x502, TrackMessage::default());
        let data = tracker.update(&refresh(&[TRIGGER_ADDR])).unwrap();
        assert!(data.points.is_empty());
    }

    #[test]
    fn test_track_ids_unique() {
        let mut tracker = tracker();
        let mut issued = HashSet::new();
        let mut previous: HashMap<u32, u64> = HashMap::new();

        for cycle in 0..20u32 {
            for addr in addresses() {
                let msg = if (addr + cycle) % 3 == 0 || addr % 5 == 0 {
                    valid(1.0, addr as f64)
                } else {
                    TrackMessage::default()
                };
                set(&mut tracker, addr, msg);
            }

            let data = tracker.update(&sweep()).unwrap();
            assert!(data.points.len() <= RADAR_MSG_COUNT);

            let mut current = HashMap::new();
            for p in &data.points {
                assert!(p.measured);
                let addr = p.d_rel as u32;
                match previous.get(&addr) {
                    Some(&id) => assert_eq!(p.track_id, id),
                    None => assert!(issued.insert(p.track_id)),
                }
                current.insert(addr, p.track_id);
            }
            previous = current;
        }

        // Ids are never handed out twice, even to freshly created slots.
        let mut tracker = RadarTracker::new(false, Some(ScriptedDecoder::default()));
        let mut last = None;
        for _ in 0..4 {
            for addr in addresses() {
                set(&mut tracker, addr, valid(0.0, 1.0));
            }
            tracker.update(&sweep()).unwrap();
            for addr in addresses() {
                set(&mut tracker, addr, TrackMessage::default());
            }
            tracker.update(&sweep()).unwrap();

            for addr in addresses() {
                set(&mut tracker, addr, valid(0.0, 1.0));
            }
            let data = tracker.update(&sweep()).unwrap();
            let min = data.points.iter().map(|p| p.track_id).min().unwrap();
            if let Some(last) = last {
                assert!(min > last);
            }
            last = data.points.iter().map(|p| p.track_id).max();
            assert_eq!(data.points.len(), RADAR_MSG_COUNT);
        }
    }

    #[test]
    fn test_points_ascending() {
        let mut tracker = tracker();
        for addr in [0x51F, 0x500, 0x510] {
            set(&mut tracker, addr, valid(0.0, 10.0));
        }
        tracker.update(&sweep()).unwrap();

        // Drop and recreate the first address, it still lists first.
        set(&mut tracker, 0x500, TrackMessage::default());
        tracker.update(&sweep()).unwrap();
        set(&mut tracker, 0x500, valid(0.0, 11.0));
        let data = tracker.update(&sweep()).unwrap();

        let d_rel: Vec<_> = data.points.iter().map(|p| p.d_rel).collect();
        assert_eq!(d_rel, vec![11.0, 10.0, 10.0]);
        assert!(data.points[0].track_id > data.points[1].track_id);
    }

    #[test]
    fn test_can_error() {
        let mut tracker = RadarTracker::new(false, Some(ScriptedDecoder::default()));
        set(&mut tracker, 0x500, valid(0.0, 10.0));
        let data = tracker.update(&sweep()).unwrap();
        assert_eq!(data.errors, vec![RadarError::CanError]);
        assert_eq!(data.points.len(), 1);
        assert_eq!(RadarError::CanError.to_string(), "canError");
    }

    #[test]
    fn test_disabled() {
        let decoder = ScriptedDecoder {
            can_valid: false,
            ..Default::default()
        };
        let mut tracker = RadarTracker::new(true, Some(decoder));
        assert!(tracker.is_disabled());
        assert_eq!(tracker.update(&[]), Some(RadarData::default()));
        assert_eq!(tracker.update(&sweep()), Some(RadarData::default()));
        assert_eq!(tracker.decoder.as_ref().unwrap().calls, 0);
        assert!(tracker.updated.is_empty());

        let mut tracker = RadarTracker::<ScriptedDecoder>::new(false, None);
        assert!(tracker.is_disabled());
        assert_eq!(tracker.update(&sweep()), Some(RadarData::default()));
        assert_eq!(tracker.track_id, 0);
    }

    #[test]
    fn test_radar_decoder() {
        let mut tracker = RadarTracker::new(false, Some(RadarDecoder::new()));
        assert!(!tracker.is_disabled());

        // STATE=3 AZIMUTH=-10° LONG_DIST=20m
        let data = 3u64 | (((-50i64) as u64) & 0x3FF) << 12 | 400u64 << 24;
        let packets: Vec<_> = addresses()
            .map(|id| Packet {
                id,
                data: if id == 0x507 { data } else { 0 },
                timestamp: 1_000_000,
            })
            .collect();

        let snapshot = tracker.update(&packets).unwrap();
        assert!(snapshot.errors.is_empty());
        assert_eq!(snapshot.points.len(), 1);
        let p = snapshot.points[0];
        assert!((p.d_rel - 20.0).abs() < 1e-9);
        assert!((p.y_rel - lateral_offset(-10.0, 20.0)).abs() < 1e-9);
        assert!(p.y_rel > 0.0);
    }
}
