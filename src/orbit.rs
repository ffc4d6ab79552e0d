//! Orbit/geofence task: propagates a Two-Line Element set and notifies the
//! mission manager when the subsatellite point crosses a fixed rectangular
//! coverage region.
//!
//! The actual SGP4/SDP4 math is an explicit non-goal (§6: "the specific
//! SGP4 math ... treated as a black-box library"); [`Propagator`] is the
//! contract a real implementation plugs into, with [`AnalyticPropagator`]
//! standing in as a deterministic, dependency-free stub for ground tests.

use thiserror::Error;

use crate::config::geofence;
use crate::satellite_state::PositionRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrbitError {
    #[error("TLE line must be exactly 69 characters, got {0}")]
    InvalidLineLength(usize),
    #[error("TLE line number must be 1 or 2, got {0}")]
    InvalidLineNumber(u8),
}

/// Geodetic position in radians/km, the propagator collaborator's output
/// contract (§6: `propagate(tle1, tle2, julian_date) -> (lat, lon, alt)`).
#[derive(Debug, Clone, Copy)]
pub struct GeodeticPosition {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_km: f64,
}

pub trait Propagator {
    fn propagate(&self, tle1: &str, tle2: &str, julian_date: f64) -> GeodeticPosition;
}

/// A deterministic placeholder propagator: not orbital mechanics, just a
/// stand-in that traces a slowly-varying path so geofence transitions are
/// exercisable in tests without a real SGP4 implementation.
pub struct AnalyticPropagator;

impl Propagator for AnalyticPropagator {
    fn propagate(&self, _tle1: &str, _tle2: &str, julian_date: f64) -> GeodeticPosition {
        let phase = julian_date.fract() * std::f64::consts::TAU;
        GeodeticPosition {
            lat_rad: (-14.0f64).to_radians() + 20.0f64.to_radians() * phase.sin(),
            lon_rad: (-54.0f64).to_radians() + 20.0f64.to_radians() * phase.cos(),
            alt_km: 550.0,
        }
    }
}

/// Accumulates TLE update telecommands (one line at a time) and re-parses
/// only once both lines are present, per §4.3.
#[derive(Debug, Default)]
pub struct TleAccumulator {
    line1: Option<arrayvec::ArrayString<70>>,
    line2: Option<arrayvec::ArrayString<70>>,
}

impl TleAccumulator {
    /// Feeds one 69-byte TLE line. Returns `Some((line1, line2))` once
    /// both lines have been received.
    pub fn accept_line(
        &mut self,
        line_number: u8,
        line: &str,
    ) -> Result<Option<(arrayvec::ArrayString<70>, arrayvec::ArrayString<70>)>, OrbitError> {
        if line.len() != 69 {
            return Err(OrbitError::InvalidLineLength(line.len()));
        }
        let mut buf = arrayvec::ArrayString::<70>::new();
        buf.push_str(line);

        match line_number {
            1 => self.line1 = Some(buf),
            2 => self.line2 = Some(buf),
            other => return Err(OrbitError::InvalidLineNumber(other)),
        }

        if let (Some(l1), Some(l2)) = (self.line1, self.line2) {
            self.line1 = None;
            self.line2 = None;
            Ok(Some((l1, l2)))
        } else {
            Ok(None)
        }
    }
}

/// Geofence edge-transition detector: remembers the previous in/out state
/// so only crossings emit an event, never steady-state occupancy.
pub struct Geofence {
    previous_in_region: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceEvent {
    InRegion,
    OutOfRegion,
}

impl Default for Geofence {
    fn default() -> Self {
        Self::new()
    }
}

impl Geofence {
    #[must_use]
    pub fn new() -> Self {
        Self { previous_in_region: None }
    }

    /// Checks a degrees-x10^7 fixed-point position against the fixed
    /// coverage rectangle, returning an event only on a state change.
    /// The first observation never emits, avoiding a spurious event at
    /// startup (§9 Design Notes).
    pub fn check(&mut self, lat_e7: i32, lon_e7: i32) -> Option<GeofenceEvent> {
        let in_region = lat_e7 >= geofence::SOUTH
            && lat_e7 <= geofence::NORTH
            && lon_e7 >= geofence::WEST
            && lon_e7 <= geofence::EAST;

        let event = match self.previous_in_region {
            None => None,
            Some(prev) if prev == in_region => None,
            Some(false) => Some(GeofenceEvent::InRegion),
            Some(true) => Some(GeofenceEvent::OutOfRegion),
        };
        self.previous_in_region = Some(in_region);
        event
    }
}

const RAD_TO_DEG_E7: f64 = 180.0 / std::f64::consts::PI * 1.0e7;

/// Converts a propagator's radian geodetic output into the fixed-point
/// position record the rest of the system stores and compares.
#[must_use]
pub fn to_position_record(pos: GeodeticPosition, timestamp_s: u32) -> PositionRecord {
    PositionRecord {
        lat_e7: (pos.lat_rad * RAD_TO_DEG_E7) as i32,
        lon_e7: (pos.lon_rad * RAD_TO_DEG_E7) as i32,
        alt_cm: (pos.alt_km * 100_000.0) as i32,
        timestamp_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geofence_is_silent_on_first_observation() {
        let mut gf = Geofence::new();
        assert_eq!(gf.check(0, -50 * 10_000_000), None);
    }

    #[test]
    fn geofence_emits_on_entry_and_exit_only() {
        let mut gf = Geofence::new();
        let inside = (0, -50 * 10_000_000);
        let outside = (40 * 10_000_000, -50 * 10_000_000);

        gf.check(outside.0, outside.1);
        assert_eq!(gf.check(inside.0, inside.1), Some(GeofenceEvent::InRegion));
        assert_eq!(gf.check(inside.0, inside.1), None, "steady state must not re-emit");
        assert_eq!(gf.check(outside.0, outside.1), Some(GeofenceEvent::OutOfRegion));
    }

    #[test]
    fn tle_accumulator_waits_for_both_lines() {
        let mut acc = TleAccumulator::default();
        let line = "1 25544U 98067A   20029.71883137  .00000634  00000-0  18264-4 0  9999".to_string();
        assert_eq!(line.len(), 69);

        assert_eq!(acc.accept_line(1, &line).unwrap(), None);
        let result = acc.accept_line(2, &line).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn tle_line_wrong_length_is_rejected() {
        let mut acc = TleAccumulator::default();
        assert_eq!(acc.accept_line(1, "too short"), Err(OrbitError::InvalidLineLength(9)));
    }
}
