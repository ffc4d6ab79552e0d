//! OBDH simulator: runs the mission manager, telemetry store, orbit task
//! and watchdog as a single process, exposing a TCP operator interface
//! that accepts SPP-framed telecommand packets and streams beacon
//! telemetry — the ground-test harness standing in for the real UART/SPI
//! host link.

use std::sync::Arc;
use std::time::Duration;

use obdh_core::config::data_id;
use obdh_core::mission_manager::{MissionEvent, MissionManager, EVENT_QUEUE_CAPACITY};
use obdh_core::orbit::{to_position_record, AnalyticPropagator, Geofence, GeofenceEvent, Propagator, TleAccumulator};
use obdh_core::producers::{build_beacon, build_data_log_record, persist, read_with_retry, FlakySensorBus, DATA_LOG_PERIOD_S, HOUSEKEEPING_PERIOD_S};
use obdh_core::satellite_state::{PayloadId, ResetReason, SatelliteState};
use obdh_core::tc_processor::{
    apply_set_parameter, build_broadcast_answer, build_data_answer, build_feedback, build_parameter_answer,
    build_payload_data_answer, build_ping_answer, param_id, parse_and_authenticate, read_parameter, subsystem_id,
    to_mission_event, AuthenticatedTc, TcError, TcRequest,
};
use obdh_core::telemetry_store::{TelemetryFamily, TelemetryStore};
use obdh_core::watchdog::{run_startup, Watchdog};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8090;
const BEACON_BROADCAST_BUFFER_SIZE: usize = 64;
const MAIN_LOOP_PERIOD_MS: u64 = 1_000;
const ORBIT_PERIOD_TICKS: u64 = 60;
const BEACON_PERIOD_TICKS: u64 = 60;
const SENSOR_READ_LEN: usize = 16;
const SENSOR_FAIL_RATE_PERCENT: u8 = 5;

/// One subsystem read per `Housekeeping`-cadence tick (§4.6): EPS, both
/// TT&C radios, the antenna deployer and both EDC payload slots.
const PRODUCER_FAMILIES: [TelemetryFamily; 6] = [
    TelemetryFamily::Eps,
    TelemetryFamily::Ttc0,
    TelemetryFamily::Ttc1,
    TelemetryFamily::Antenna,
    TelemetryFamily::Edc,
    TelemetryFamily::Px,
];

struct Obdh {
    state: SatelliteState,
    store: TelemetryStore,
    mission_manager: MissionManager,
    event_queue: heapless::spsc::Queue<MissionEvent, EVENT_QUEUE_CAPACITY>,
    geofence: Geofence,
    propagator: AnalyticPropagator,
    tle_accumulator: TleAccumulator,
    watchdog: Watchdog,
    sensor_bus: FlakySensorBus,
    now_s: u32,
}

impl Obdh {
    fn new() -> Self {
        let mut store = TelemetryStore::new();
        let mut state = SatelliteState::default();
        run_startup(&mut store, &mut state, ResetReason::PowerOn);
        Self {
            state,
            store,
            mission_manager: MissionManager::new(),
            event_queue: MissionManager::make_queue(),
            geofence: Geofence::new(),
            propagator: AnalyticPropagator,
            tle_accumulator: TleAccumulator::default(),
            watchdog: Watchdog::new(),
            sensor_bus: FlakySensorBus::new(0xC0FF_EE01, SENSOR_FAIL_RATE_PERCENT),
            now_s: 0,
        }
    }

    async fn tick(&mut self) {
        self.now_s = self.now_s.wrapping_add(1);
        self.watchdog.kick();

        if let Some(event) = self.mission_manager.check_hibernation_timeout(&self.state, self.now_s) {
            let (mut producer, _) = self.event_queue.split();
            let _ = producer.enqueue(event);
        }

        if u64::from(self.now_s) % ORBIT_PERIOD_TICKS == 0 {
            let julian_date = f64::from(self.now_s) / 86_400.0;
            let pos = self.propagator.propagate(&self.state.tle_line1, &self.state.tle_line2, julian_date);
            self.state.position = to_position_record(pos, self.now_s);

            if let Some(geofence_event) = self.geofence.check(self.state.position.lat_e7, self.state.position.lon_e7) {
                let mission_event = match geofence_event {
                    GeofenceEvent::InRegion => MissionEvent::InRegion,
                    GeofenceEvent::OutOfRegion => MissionEvent::OutOfRegion,
                };
                let (mut producer, _) = self.event_queue.split();
                let _ = producer.enqueue(mission_event);
            }
        }

        let (_, mut consumer) = self.event_queue.split();
        let actions = self.mission_manager.drain_events(&mut consumer, &mut self.state, self.now_s);
        for action in actions {
            info!(target: "obdh_sim", ?action, "mission action");
        }

        // Housekeeping (60 s): mirror live state into FRAM and refresh
        // every subsystem's own telemetry record.
        if u64::from(self.now_s) % HOUSEKEEPING_PERIOD_S == 0 {
            self.read_producers().await;
            self.store.write_fram_config(&fram_snapshot(&self.state));
        }

        // DataLog (600 s): a separate, slower cadence that snapshots the
        // consolidated state of every subsystem's telemetry into its own
        // OBDH-family record (§4.2.1) — distinct from Housekeeping above.
        if u64::from(self.now_s) % DATA_LOG_PERIOD_S == 0 {
            let record = build_data_log_record(&self.state);
            persist(&mut self.store, &mut self.state, TelemetryFamily::Obdh, &record, self.now_s);
        }
    }

    /// Reads every subsystem family once, per §4.6's per-family retry
    /// policy, persisting whatever comes back into its own NOR ring.
    async fn read_producers(&mut self) {
        for family in PRODUCER_FAMILIES {
            let record = read_with_retry(family, &mut self.sensor_bus, SENSOR_READ_LEN, time::sleep).await;
            if let Some(record) = record {
                persist(&mut self.store, &mut self.state, family, &record, self.now_s);
            }
        }
    }

    /// Accepts one TLE line telecommand, forwarding to the orbit task's
    /// accumulator and, once both lines are present, updating the TLE the
    /// propagator reads (§4.5 UpdateTle: "notifies orbit task when both
    /// present").
    fn accept_tle_line(&mut self, line_number: u8, line: &[u8; 69]) {
        let line_str = String::from_utf8_lossy(line);
        match self.tle_accumulator.accept_line(line_number, &line_str) {
            Ok(Some((line1, line2))) => {
                self.state.tle_line1 = line1;
                self.state.tle_line2 = line2;
                info!(target: "obdh_sim", "TLE updated, orbit task notified");
            }
            Ok(None) => {}
            Err(err) => {
                let obdh_err: obdh_core::ObdhError = err.into();
                warn!(target: "obdh_sim", %obdh_err, "TLE line rejected");
            }
        }
    }

    /// Carries out a request's side effects, builds its downlink reply,
    /// and (for the four requests that change mode/payload state) posts
    /// the resulting mission event — the dispatch step spec.md §4.5
    /// describes as "executes the per-command handler."
    fn execute_request(&mut self, packet_id: u8, tc: &AuthenticatedTc) -> Result<Vec<u8>, TcError> {
        match &tc.request {
            TcRequest::Ping => return Ok(build_ping_answer(&tc.callsign)),

            TcRequest::DataRequest { data_id: id, start_idx, end_idx } => {
                let pages = family_for_data_id(*id)
                    .map(|family| self.store.read_range(family, &self.state.media, *start_idx, *end_idx))
                    .unwrap_or_default();
                let pages: Vec<Vec<u8>> = pages.into_iter().map(|page| page.to_vec()).collect();
                return Ok(build_data_answer(&tc.callsign, *id, &pages));
            }

            TcRequest::Broadcast { message } => return Ok(build_broadcast_answer(&tc.callsign, message)),

            TcRequest::GetParameter { subsystem, param_id: pid } => {
                let value = read_parameter(&self.state, *subsystem, *pid);
                return Ok(build_parameter_answer(&tc.callsign, *subsystem, *pid, value));
            }

            TcRequest::GetPayloadData { payload, offset } => {
                let bytes = last_telemetry_bytes_for_payload(&self.state, *payload);
                return Ok(build_payload_data_answer(&tc.callsign, *payload, *offset, &bytes));
            }

            TcRequest::SetParameter { subsystem, param_id: pid, value } => {
                if *subsystem == subsystem_id::OBDH && *pid == param_id::PX_DURATION_MS {
                    self.mission_manager.set_px_duration_ms(*value);
                } else if to_mission_event(&tc.request).is_none() {
                    apply_set_parameter(&mut self.state, *subsystem, *pid, *value);
                }
            }

            TcRequest::UpdateTle { line_number, line } => self.accept_tle_line(*line_number, line),

            TcRequest::ForceReset => {
                self.state.reset_counter = self.state.reset_counter.wrapping_add(1);
                self.state.reset_reason = ResetReason::ForceReset;
                info!(target: "obdh_sim", "force reset: EPS and both TTCs reset, OBDH self-reset recorded");
            }

            TcRequest::EraseMemory => {
                self.store.erase_all();
                info!(target: "obdh_sim", "telemetry memory erased");
            }

            TcRequest::ActivateModule { module_id } => {
                info!(target: "obdh_sim", module_id, "module activated");
            }

            TcRequest::DeactivateModule { module_id } => {
                info!(target: "obdh_sim", module_id, "module deactivated");
            }

            TcRequest::TransmitPacket { payload } => match obdh_core::ngham::encode(payload, 0) {
                Ok(frame) => info!(target: "obdh_sim", bytes = frame.len(), "payload transmitted over the radio link"),
                Err(err) => warn!(target: "obdh_sim", %err, "transmit packet rejected by the radio-link codec"),
            },

            TcRequest::EnterHibernation { .. }
            | TcRequest::LeaveHibernation
            | TcRequest::ActivatePayload { .. }
            | TcRequest::DeactivatePayload { .. } => {}
        }

        if let Some(event) = to_mission_event(&tc.request) {
            let (mut producer, _) = self.event_queue.split();
            producer.enqueue(event).map_err(|_| TcError::AckTimeout)?;
            let (_, mut consumer) = self.event_queue.split();
            let actions = self.mission_manager.drain_events(&mut consumer, &mut self.state, self.now_s);
            for action in actions {
                info!(target: "obdh_sim", ?action, "telecommand-triggered mission action");
            }
        }

        Ok(build_feedback(&tc.callsign, packet_id, self.now_s))
    }

    fn handle_telecommand(&mut self, pkt: &[u8]) -> Result<Vec<u8>, TcError> {
        let tc = parse_and_authenticate(pkt)?;
        self.execute_request(pkt[0], &tc)
    }
}

fn family_for_data_id(id: u8) -> Option<TelemetryFamily> {
    Some(match id {
        data_id::OBDH => TelemetryFamily::Obdh,
        data_id::EPS => TelemetryFamily::Eps,
        data_id::TTC0 => TelemetryFamily::Ttc0,
        data_id::TTC1 => TelemetryFamily::Ttc1,
        data_id::ANTENNA => TelemetryFamily::Antenna,
        data_id::EDC_INFO => TelemetryFamily::Edc,
        data_id::SBCD => TelemetryFamily::Sbcd,
        data_id::PX => TelemetryFamily::Px,
        _ => return None,
    })
}

fn last_telemetry_bytes_for_payload(state: &SatelliteState, payload: PayloadId) -> Vec<u8> {
    let record = match payload {
        PayloadId::EdcA | PayloadId::EdcB => state.last_telemetry.edc.as_ref(),
        PayloadId::PayloadX => state.last_telemetry.px.as_ref(),
        PayloadId::None => None,
    };
    record.map(|record| record.bytes.clone()).unwrap_or_default()
}

#[derive(Serialize)]
struct TcResponse {
    ok: bool,
    feedback_hex: Option<String>,
    error: Option<String>,
}

/// Minimal FRAM mirror record: mode, TLE presence and media cursors —
/// just enough for [`obdh_core::watchdog::run_startup`] to detect a
/// warm start.
fn fram_snapshot(state: &SatelliteState) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.push(state.mode as u8);
    out.extend_from_slice(&state.mode_duration.to_be_bytes());
    out.extend_from_slice(&state.reset_counter.to_be_bytes());
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("OBDH core simulator");
    println!("====================");

    let obdh = Arc::new(Mutex::new(Obdh::new()));
    let (beacon_tx, _) = broadcast::channel::<Vec<u8>>(BEACON_BROADCAST_BUFFER_SIZE);

    let tcp_obdh = Arc::clone(&obdh);
    let tcp_beacon_tx = beacon_tx.clone();
    let _tcp_server = tokio::spawn(async move {
        if let Err(e) = run_tcp_server(tcp_obdh, tcp_beacon_tx).await {
            error!("TCP server error: {e}");
        }
    });

    let mut interval = time::interval(Duration::from_millis(MAIN_LOOP_PERIOD_MS));
    let mut tick_count: u64 = 0;
    loop {
        interval.tick().await;
        tick_count += 1;

        let mut guard = obdh.lock().await;
        guard.tick().await;

        if tick_count % BEACON_PERIOD_TICKS == 0 {
            let frame = obdh_core::spp::encode(obdh_core::spp::SppType::Tx, &build_beacon(&guard.state));
            let _ = beacon_tx.send(frame);
        }
        drop(guard);
    }
}

async fn run_tcp_server(obdh: Arc<Mutex<Obdh>>, beacon_tx: broadcast::Sender<Vec<u8>>) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(("127.0.0.1", TCP_PORT)).await?;
    info!("listening on port {TCP_PORT}");

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("client connected: {addr}");
        let client_obdh = Arc::clone(&obdh);
        let client_beacon_rx = beacon_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, client_obdh, client_beacon_rx).await {
                warn!("client {addr} error: {e}");
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    obdh: Arc<Mutex<Obdh>>,
    mut beacon_rx: broadcast::Receiver<Vec<u8>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    let beacon_writer = Arc::clone(&writer);
    let beacon_task = tokio::spawn(async move {
        while let Ok(beacon) = beacon_rx.recv().await {
            let line = format!("BEACON {}\n", hex_encode(&beacon));
            let mut guard = beacon_writer.lock().await;
            if guard.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let response = process_line(&obdh, trimmed).await;
                let mut guard = writer.lock().await;
                guard.write_all(response.as_bytes()).await?;
                guard.write_all(b"\n").await?;
            }
            Err(e) => {
                error!("read error: {e}");
                break;
            }
        }
    }

    beacon_task.abort();
    Ok(())
}

/// Unwraps one SPP-framed command, dispatches it, and re-wraps the JSON
/// reply in its own SPP frame — the host-link framing named in §6 applied
/// to this simulator's one real host link, the TCP connection to
/// `obdh-ctl`. Telecommand and TLE-update failures convert into
/// [`obdh_core::ObdhError`] at this top-level boundary, matching §7.1's
/// propagation policy: the component keeps its own error type, and only
/// the task loop that can merely log-and-report converts it.
async fn process_line(obdh: &Arc<Mutex<Obdh>>, line: &str) -> String {
    let wrap = |frame_type, body: &str| hex_encode(&obdh_core::spp::encode(frame_type, body.as_bytes()));

    let raw = match hex_decode(line) {
        Ok(raw) => raw,
        Err(()) => return wrap(obdh_core::spp::SppType::Local, "invalid hex"),
    };
    let pkt = match obdh_core::spp::decode(&raw) {
        Ok((frame, _)) => frame.payload,
        Err(err) => return wrap(obdh_core::spp::SppType::Local, &err.to_string()),
    };

    let mut guard = obdh.lock().await;
    let json = match guard.handle_telecommand(&pkt) {
        Ok(feedback) => serde_json::to_string(&TcResponse {
            ok: true,
            feedback_hex: Some(hex_encode(&feedback)),
            error: None,
        })
        .unwrap_or_default(),
        Err(e) => {
            let obdh_err: obdh_core::ObdhError = e.into();
            serde_json::to_string(&TcResponse { ok: false, feedback_hex: None, error: Some(obdh_err.to_string()) })
                .unwrap_or_default()
        }
    };
    wrap(obdh_core::spp::SppType::Tx, &json)
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
