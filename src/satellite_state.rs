//! The process-wide satellite state: current mode, payload slots, latest
//! per-subsystem telemetry, position/TLE, and the NOR media cursors.
//!
//! Modeled as an owned resource behind a single `Mutex`, written
//! multi-field by the mission manager under one lock acquisition (so a
//! reader never observes a mode paired with a stale timestamp) and
//! single-field by producers for their own sub-records, per the
//! concurrency design note.

use serde::{Deserialize, Serialize};

use crate::config::{MEDIA_RANGE_EDC, MEDIA_RANGE_EPS, MEDIA_RANGE_OBDH, MEDIA_RANGE_PX, MEDIA_RANGE_SBCD, MEDIA_RANGE_TTC0, MEDIA_RANGE_TTC1, MEDIA_RANGE_ANTENNA};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalMode {
    Normal,
    StandBy,
    Hibernation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadId {
    None,
    EdcA,
    EdcB,
    PayloadX,
}

/// Next-write page index within a per-family ring in NOR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaCursors {
    pub obdh: u32,
    pub eps: u32,
    pub ttc0: u32,
    pub ttc1: u32,
    pub antenna: u32,
    pub edc: u32,
    pub px: u32,
    pub sbcd: u32,
}

impl Default for MediaCursors {
    fn default() -> Self {
        Self {
            obdh: MEDIA_RANGE_OBDH.start_page,
            eps: MEDIA_RANGE_EPS.start_page,
            ttc0: MEDIA_RANGE_TTC0.start_page,
            ttc1: MEDIA_RANGE_TTC1.start_page,
            antenna: MEDIA_RANGE_ANTENNA.start_page,
            edc: MEDIA_RANGE_EDC.start_page,
            px: MEDIA_RANGE_PX.start_page,
            sbcd: MEDIA_RANGE_SBCD.start_page,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Latitude, degrees x 10^7.
    pub lat_e7: i32,
    /// Longitude, degrees x 10^7.
    pub lon_e7: i32,
    /// Altitude, centimeters.
    pub alt_cm: i32,
    pub timestamp_s: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerOn,
    Watchdog,
    ForceReset,
    Brownout,
}

/// One subsystem's latest telemetry snapshot — the raw bytes last written
/// into its NOR ring, plus the timestamp of that write. Kept separately
/// from the ring itself so a `GetParameter`/beacon reader always has O(1)
/// access to "what did we last hear from this subsystem" without paging
/// back through `TelemetryStore`.
#[derive(Debug, Clone, Default)]
pub struct TelemetryRecord {
    pub timestamp_s: u32,
    pub bytes: Vec<u8>,
}

/// Per-subsystem `last_telemetry` snapshots (spec.md §3's "media-cursor
/// sub-record"), one slot per family sharing [`MediaCursors`]'s field
/// layout.
#[derive(Debug, Clone, Default)]
pub struct LastTelemetry {
    pub obdh: Option<TelemetryRecord>,
    pub eps: Option<TelemetryRecord>,
    pub ttc0: Option<TelemetryRecord>,
    pub ttc1: Option<TelemetryRecord>,
    pub antenna: Option<TelemetryRecord>,
    pub edc: Option<TelemetryRecord>,
    pub px: Option<TelemetryRecord>,
    pub sbcd: Option<TelemetryRecord>,
}

#[derive(Debug, Clone)]
pub struct SatelliteState {
    pub mode: OperationalMode,
    pub ts_last_mode_change: u32,
    /// Remaining hibernation duration in seconds, valid only while in
    /// `Hibernation`.
    pub mode_duration: u32,
    pub manual_mode_on: bool,
    pub active_payload: [PayloadId; 2],
    pub edc_active: bool,
    pub current_edc: PayloadId,
    pub main_edc: PayloadId,
    pub in_region: bool,
    pub position: PositionRecord,
    pub tle_line1: arrayvec::ArrayString<70>,
    pub tle_line2: arrayvec::ArrayString<70>,
    pub media: MediaCursors,
    pub last_telemetry: LastTelemetry,
    pub reset_reason: ResetReason,
    pub reset_counter: u32,
}

impl Default for SatelliteState {
    fn default() -> Self {
        Self {
            mode: OperationalMode::Normal,
            ts_last_mode_change: 0,
            mode_duration: 0,
            manual_mode_on: false,
            active_payload: [PayloadId::None, PayloadId::None],
            edc_active: false,
            current_edc: PayloadId::None,
            main_edc: PayloadId::EdcA,
            in_region: false,
            position: PositionRecord::default(),
            tle_line1: arrayvec::ArrayString::new(),
            tle_line2: arrayvec::ArrayString::new(),
            media: MediaCursors::default(),
            last_telemetry: LastTelemetry::default(),
            reset_reason: ResetReason::PowerOn,
            reset_counter: 0,
        }
    }
}

impl SatelliteState {
    /// Atomically updates mode and its change timestamp, matching the
    /// origin's `satellite_change_mode` critical section.
    pub fn change_mode(&mut self, mode: OperationalMode, now_s: u32) {
        self.mode = mode;
        self.ts_last_mode_change = now_s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_media_cursors_start_at_family_start_page() {
        let cursors = MediaCursors::default();
        assert_eq!(cursors.obdh, MEDIA_RANGE_OBDH.start_page);
        assert_eq!(cursors.eps, MEDIA_RANGE_EPS.start_page);
    }

    #[test]
    fn change_mode_updates_both_fields_together() {
        let mut state = SatelliteState::default();
        state.change_mode(OperationalMode::Hibernation, 1_000);
        assert_eq!(state.mode, OperationalMode::Hibernation);
        assert_eq!(state.ts_last_mode_change, 1_000);
    }
}
