//! Periodic producer tasks: simulated sensor/subsystem reads that feed the
//! telemetry store and the beacon, each on its own clock.
//!
//! Grounded on the scheduling table (§5: `ReadEps(3/60s)`, `ReadTtc(3/60s)`,
//! `ReadAntenna(3/60s)`, `ReadEdc(3/60s)`, `ReadPx(3/60s)`,
//! `DataLog(3/600s)`, `Beacon(5/60s)`, `GeneralTelemetry(4/60s)`) and on
//! the teacher's [`crate::fault_injection`] deterministic LCG for simulated
//! transient read failures.

use tracing::{error, warn};

use crate::satellite_state::{PayloadId, SatelliteState};
use crate::telemetry_store::{record_last_telemetry, TelemetryFamily, TelemetryStore};

pub const HOUSEKEEPING_PERIOD_S: u64 = 60;
pub const DATA_LOG_PERIOD_S: u64 = 600;
pub const BEACON_PERIOD_S: u64 = 60;

const MAX_READ_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFailure;

/// Deterministic linear-congruential generator standing in for a noisy
/// sensor bus, so retry/backoff behavior is exercisable without real I/O.
pub struct FlakySensorBus {
    rng_state: u64,
    fail_rate_percent: u8,
}

impl FlakySensorBus {
    #[must_use]
    pub fn new(seed: u64, fail_rate_percent: u8) -> Self {
        Self { rng_state: seed, fail_rate_percent }
    }

    fn next_u8(&mut self) -> u8 {
        self.rng_state = self.rng_state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.rng_state >> 24) as u8
    }

    /// Simulates one bus transaction: returns a deterministic payload or a
    /// transient failure, with the configured failure rate.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>, ReadFailure> {
        if u16::from(self.next_u8()) * 100 / 256 < u16::from(self.fail_rate_percent) {
            return Err(ReadFailure);
        }
        Ok((0..len).map(|_| self.next_u8()).collect())
    }
}

/// Reads one telemetry family from `bus`, retrying transient failures up
/// to [`MAX_READ_RETRIES`] times with a fixed backoff, per §7's transient
/// I/O policy ("retry a bounded number of times, then log-and-skip").
///
/// `sleep` is injected so tests can run this synchronously; production
/// callers pass `tokio::time::sleep`.
pub async fn read_with_retry<F, Fut>(
    family: TelemetryFamily,
    bus: &mut FlakySensorBus,
    len: usize,
    sleep: F,
) -> Option<Vec<u8>>
where
    F: Fn(std::time::Duration) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    for attempt in 0..=MAX_READ_RETRIES {
        match bus.read(len) {
            Ok(data) => return Some(data),
            Err(ReadFailure) if attempt < MAX_READ_RETRIES => {
                warn!(target: "producers", ?family, attempt, "transient read failure, retrying");
                sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }
            Err(ReadFailure) => {
                error!(target: "producers", ?family, "giving up after {MAX_READ_RETRIES} retries");
                return None;
            }
        }
    }
    None
}

/// Writes a successfully-read record into the log, advancing that
/// family's ring cursor, and refreshes `state.last_telemetry` for that
/// family so `GetParameter`/`GetPayloadData` always see the latest read
/// without paging back through the ring.
pub fn persist(store: &mut TelemetryStore, state: &mut SatelliteState, family: TelemetryFamily, record: &[u8], now_s: u32) {
    match store.write_record(family, record, &mut state.media) {
        Ok(()) => record_last_telemetry(state, family, record, now_s),
        Err(err) => error!(target: "producers", ?family, %err, "failed to persist telemetry record"),
    }
}

/// Builds the OBDH `DataLog` task's consolidated record (§4.2.1): the
/// timestamp of every subsystem's latest telemetry snapshot, refreshed on
/// its own 600 s cadence distinct from `Housekeeping`'s 60 s FRAM mirror.
#[must_use]
pub fn build_data_log_record(state: &SatelliteState) -> Vec<u8> {
    let slots = [
        &state.last_telemetry.obdh,
        &state.last_telemetry.eps,
        &state.last_telemetry.ttc0,
        &state.last_telemetry.ttc1,
        &state.last_telemetry.antenna,
        &state.last_telemetry.edc,
        &state.last_telemetry.px,
        &state.last_telemetry.sbcd,
    ];
    let mut out = Vec::with_capacity(slots.len() * 4);
    for slot in slots {
        let ts = slot.as_ref().map_or(0, |record| record.timestamp_s);
        out.extend_from_slice(&ts.to_be_bytes());
    }
    out
}

/// Builds the fixed-layout beacon summary frame: mode, in-region flag,
/// active payload slots and latest position, the payload the periodic
/// `Beacon` task hands to the NGHam encoder (§4.6).
#[must_use]
pub fn build_beacon(state: &SatelliteState) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.push(crate::config::downlink_id::TELEMETRY);
    out.push(state.mode as u8);
    out.push(u8::from(state.in_region));
    out.push(payload_code(state.active_payload[0]));
    out.push(payload_code(state.active_payload[1]));
    out.extend_from_slice(&state.position.lat_e7.to_be_bytes());
    out.extend_from_slice(&state.position.lon_e7.to_be_bytes());
    out.extend_from_slice(&state.position.alt_cm.to_be_bytes());
    out.extend_from_slice(&state.position.timestamp_s.to_be_bytes());
    out
}

fn payload_code(id: PayloadId) -> u8 {
    match id {
        PayloadId::None => 0,
        PayloadId::EdcA => 1,
        PayloadId::EdcB => 2,
        PayloadId::PayloadX => 3,
    }
}
