//! Persistent telemetry log: a ring-buffered append-only log of
//! per-subsystem telemetry records on simulated NOR flash, with a FRAM
//! mirror of the OBDH "last known good" configuration (mode, TLE, media
//! cursors) protected against power loss.
//!
//! Grounded on the teacher's [`crate::ngham`] neighbor module for the
//! fixed-size-record style, and on the origin's `data_log.c` /
//! `housekeeping.c` cadence — a 600 s `DataLog` snapshot distinct from the
//! 60 s `Housekeeping` FRAM mirror, both driven from [`crate::producers`].

use std::collections::HashMap;

use thiserror::Error;

use crate::config::{
    MediaRange, FRAM_MAGIC, MEDIA_RANGE_ANTENNA, MEDIA_RANGE_EDC, MEDIA_RANGE_EPS, MEDIA_RANGE_OBDH,
    MEDIA_RANGE_PX, MEDIA_RANGE_SBCD, MEDIA_RANGE_TTC0, MEDIA_RANGE_TTC1, NOR_PAGE_SIZE,
};
use crate::satellite_state::{LastTelemetry, MediaCursors, SatelliteState, TelemetryRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryStoreError {
    #[error("subsystem family {0:?} has no defined media range")]
    UnknownFamily(TelemetryFamily),
    #[error("record length {0} exceeds one NOR page ({NOR_PAGE_SIZE} bytes)")]
    RecordTooLarge(usize),
    #[error("FRAM image was corrupted (magic word mismatch)")]
    FramCorrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryFamily {
    Obdh,
    Eps,
    Ttc0,
    Ttc1,
    Antenna,
    Edc,
    Px,
    Sbcd,
}

impl TelemetryFamily {
    const fn range(self) -> MediaRange {
        match self {
            Self::Obdh => MEDIA_RANGE_OBDH,
            Self::Eps => MEDIA_RANGE_EPS,
            Self::Ttc0 => MEDIA_RANGE_TTC0,
            Self::Ttc1 => MEDIA_RANGE_TTC1,
            Self::Antenna => MEDIA_RANGE_ANTENNA,
            Self::Edc => MEDIA_RANGE_EDC,
            Self::Px => MEDIA_RANGE_PX,
            Self::Sbcd => MEDIA_RANGE_SBCD,
        }
    }
}

/// A NOR-flash-backed ring log, one region per telemetry family. Modeled
/// in memory as a sparse page map; only written pages occupy space, but
/// cursor arithmetic behaves exactly as the flat-address hardware would.
pub struct TelemetryStore {
    pages: HashMap<(TelemetryFamily, u32), [u8; NOR_PAGE_SIZE]>,
    fram_magic: Option<[u8; 8]>,
    fram_config: Vec<u8>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { pages: HashMap::new(), fram_magic: None, fram_config: Vec::new() }
    }

    /// Writes one page-sized record to `family`'s ring at the cursor
    /// recorded in `cursors`, then advances and wraps that cursor.
    pub fn write_record(
        &mut self,
        family: TelemetryFamily,
        record: &[u8],
        cursors: &mut MediaCursors,
    ) -> Result<(), TelemetryStoreError> {
        if record.len() > NOR_PAGE_SIZE {
            return Err(TelemetryStoreError::RecordTooLarge(record.len()));
        }
        let range = family.range();
        let cursor = cursor_field_mut(cursors, family);

        let mut page = [0u8; NOR_PAGE_SIZE];
        page[..record.len()].copy_from_slice(record);
        self.pages.insert((family, *cursor), page);

        *cursor += 1;
        if *cursor > range.end_page {
            *cursor = range.start_page;
        }
        Ok(())
    }

    /// Reads pages `[cursor - end_index, cursor - start_index)` relative to
    /// the current cursor, oldest first — the contract a `DataRequest`
    /// telecommand uses to page back through history.
    #[must_use]
    pub fn read_range(
        &self,
        family: TelemetryFamily,
        cursors: &MediaCursors,
        start_index: u32,
        end_index: u32,
    ) -> Vec<[u8; NOR_PAGE_SIZE]> {
        let range = family.range();
        let span = range.len();
        let cursor = *cursor_field(cursors, family);

        let mut out = Vec::new();
        if end_index <= start_index {
            return out;
        }
        for offset in start_index..end_index {
            let delta = offset + 1;
            let page = wrapping_sub(cursor, delta, range.start_page, span);
            if let Some(data) = self.pages.get(&(family, page)) {
                out.push(*data);
            } else {
                out.push([0u8; NOR_PAGE_SIZE]);
            }
        }
        out
    }

    /// Writes the OBDH configuration image (mode, TLE, cursors — whatever
    /// the caller has already serialized) atomically: the whole record
    /// replaces the prior one in a single step, so a reader after a power
    /// cut sees either the old or the new image, never a torn mix.
    pub fn write_fram_config(&mut self, record: &[u8]) {
        self.fram_config = record.to_vec();
        self.fram_magic = Some(FRAM_MAGIC);
    }

    #[must_use]
    pub fn read_fram_config(&self) -> Result<&[u8], TelemetryStoreError> {
        match self.fram_magic {
            Some(magic) if magic == FRAM_MAGIC => Ok(&self.fram_config),
            _ => Err(TelemetryStoreError::FramCorrupted),
        }
    }

    /// Simulates a power-cut boot: if the FRAM magic word is absent,
    /// erases NOR and re-seeds `state` with defaults, matching the
    /// recovery path in §3/§8 scenario 6.
    pub fn recover_or_default(&mut self, state: &mut SatelliteState) -> bool {
        if self.fram_magic == Some(FRAM_MAGIC) {
            return false;
        }
        self.pages.clear();
        *state = SatelliteState::default();
        self.fram_magic = Some(FRAM_MAGIC);
        true
    }

    /// Wipes every page in every family's ring, per the `EraseMemory`
    /// telecommand (spec.md §4.5). The FRAM configuration mirror is left
    /// untouched — erasing the data log does not erase the satellite's
    /// last known good mode/TLE.
    pub fn erase_all(&mut self) {
        self.pages.clear();
    }
}

/// Records `bytes` as `family`'s `last_telemetry` snapshot, for the
/// per-subsystem summaries spec.md §3 carries alongside the NOR ring
/// (read back by `GetPayloadData`/`GetParameter` and folded into the
/// `DataLog` task's consolidated record).
pub fn record_last_telemetry(state: &mut SatelliteState, family: TelemetryFamily, bytes: &[u8], timestamp_s: u32) {
    *last_telemetry_field(&mut state.last_telemetry, family) =
        Some(TelemetryRecord { timestamp_s, bytes: bytes.to_vec() });
}

fn last_telemetry_field(last: &mut LastTelemetry, family: TelemetryFamily) -> &mut Option<TelemetryRecord> {
    match family {
        TelemetryFamily::Obdh => &mut last.obdh,
        TelemetryFamily::Eps => &mut last.eps,
        TelemetryFamily::Ttc0 => &mut last.ttc0,
        TelemetryFamily::Ttc1 => &mut last.ttc1,
        TelemetryFamily::Antenna => &mut last.antenna,
        TelemetryFamily::Edc => &mut last.edc,
        TelemetryFamily::Px => &mut last.px,
        TelemetryFamily::Sbcd => &mut last.sbcd,
    }
}

fn cursor_field(cursors: &MediaCursors, family: TelemetryFamily) -> &u32 {
    match family {
        TelemetryFamily::Obdh => &cursors.obdh,
        TelemetryFamily::Eps => &cursors.eps,
        TelemetryFamily::Ttc0 => &cursors.ttc0,
        TelemetryFamily::Ttc1 => &cursors.ttc1,
        TelemetryFamily::Antenna => &cursors.antenna,
        TelemetryFamily::Edc => &cursors.edc,
        TelemetryFamily::Px => &cursors.px,
        TelemetryFamily::Sbcd => &cursors.sbcd,
    }
}

fn cursor_field_mut(cursors: &mut MediaCursors, family: TelemetryFamily) -> &mut u32 {
    match family {
        TelemetryFamily::Obdh => &mut cursors.obdh,
        TelemetryFamily::Eps => &mut cursors.eps,
        TelemetryFamily::Ttc0 => &mut cursors.ttc0,
        TelemetryFamily::Ttc1 => &mut cursors.ttc1,
        TelemetryFamily::Antenna => &mut cursors.antenna,
        TelemetryFamily::Edc => &mut cursors.edc,
        TelemetryFamily::Px => &mut cursors.px,
        TelemetryFamily::Sbcd => &mut cursors.sbcd,
    }
}

fn wrapping_sub(cursor: u32, delta: u32, start: u32, span: u32) -> u32 {
    let offset = (cursor - start + span - (delta % span)) % span;
    start + offset
}
