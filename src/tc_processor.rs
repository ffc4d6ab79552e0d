//! Telecommand processor: an authenticated command pipeline that parses
//! uplinked NGHam packets, verifies per-command HMAC-SHA1 keys, and
//! dispatches to executors.
//!
//! Grounded on the teacher's `protocol.rs` (`CommandTracker` / dispatch
//! table shape) and on the origin's `process_tc.c` handler table — one
//! prefix length and key per packet ID, exactly mirroring the table of
//! `process_tc_validate_hmac` call sites.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{tc_id, tc_key, CALLSIGN_FIELD_LEN, HMAC_TAG_LEN};
use crate::mission_manager::{ModeChangeRequest, MissionEvent};
use crate::satellite_state::{PayloadId, SatelliteState};

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TcError {
    #[error("packet too short for its declared ID (len {len}, need {need})")]
    TooShort { len: usize, need: usize },
    #[error("unknown telecommand packet ID {0:#04x}")]
    UnknownPacketId(u8),
    #[error("HMAC authentication failed")]
    AuthFailure,
    #[error("mission manager acknowledgement timed out")]
    AckTimeout,
}

/// The requester callsign embedded in bytes `[1..8)` of every TC packet.
pub type Callsign = [u8; CALLSIGN_FIELD_LEN];

/// What a telecommand asks the rest of the system to do, after
/// authentication has already succeeded — a tagged sum rather than an
/// integer code plus byte array, per the governing design note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcRequest {
    Ping,
    DataRequest { data_id: u8, start_idx: u32, end_idx: u32 },
    Broadcast { message: Vec<u8> },
    EnterHibernation { hours: u16 },
    LeaveHibernation,
    ActivateModule { module_id: u8 },
    DeactivateModule { module_id: u8 },
    ActivatePayload { payload: PayloadId },
    DeactivatePayload { payload: PayloadId },
    EraseMemory,
    ForceReset,
    GetPayloadData { payload: PayloadId, offset: u32 },
    SetParameter { subsystem: u8, param_id: u8, value: u32 },
    GetParameter { subsystem: u8, param_id: u8 },
    UpdateTle { line_number: u8, line: [u8; 69] },
    TransmitPacket { payload: Vec<u8> },
}

/// A fully parsed, authenticated telecommand ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedTc {
    pub callsign: Callsign,
    pub request: TcRequest,
}

struct HandlerSpec {
    /// Number of leading bytes (from the start of the packet) the HMAC is
    /// computed over.
    auth_prefix_len: Option<usize>,
    key: &'static [u8],
}

fn handler_spec(packet_id: u8) -> Option<HandlerSpec> {
    use tc_id::*;
    Some(match packet_id {
        PING => HandlerSpec { auth_prefix_len: None, key: b"" },
        DATA_REQUEST => HandlerSpec { auth_prefix_len: Some(1 + 7 + 1 + 4 + 4), key: tc_key::DATA_REQUEST },
        BROADCAST => HandlerSpec { auth_prefix_len: None, key: b"" },
        ENTER_HIBERNATION => {
            HandlerSpec { auth_prefix_len: Some(1 + 7 + 2), key: tc_key::ENTER_HIBERNATION }
        }
        LEAVE_HIBERNATION => HandlerSpec { auth_prefix_len: Some(1 + 7), key: tc_key::LEAVE_HIBERNATION },
        ACTIVATE_MODULE => HandlerSpec { auth_prefix_len: Some(1 + 7 + 1), key: tc_key::ACTIVATE_MODULE },
        DEACTIVATE_MODULE => {
            HandlerSpec { auth_prefix_len: Some(1 + 7 + 1), key: tc_key::DEACTIVATE_MODULE }
        }
        ACTIVATE_PAYLOAD => HandlerSpec { auth_prefix_len: Some(1 + 7 + 1), key: tc_key::ACTIVATE_PAYLOAD },
        DEACTIVATE_PAYLOAD => {
            HandlerSpec { auth_prefix_len: Some(1 + 7 + 1), key: tc_key::DEACTIVATE_PAYLOAD }
        }
        ERASE_MEMORY => HandlerSpec { auth_prefix_len: Some(1 + 7), key: tc_key::ERASE_MEMORY },
        FORCE_RESET => HandlerSpec { auth_prefix_len: Some(1 + 7), key: tc_key::FORCE_RESET },
        GET_PAYLOAD_DATA => {
            HandlerSpec { auth_prefix_len: Some(1 + 7 + 1 + 4), key: tc_key::GET_PAYLOAD_DATA }
        }
        SET_PARAMETER => {
            HandlerSpec { auth_prefix_len: Some(1 + 7 + 1 + 1 + 4), key: tc_key::SET_PARAMETER }
        }
        GET_PARAMETER => HandlerSpec { auth_prefix_len: Some(1 + 7 + 1 + 1), key: tc_key::GET_PARAMETER },
        UPDATE_TLE => HandlerSpec { auth_prefix_len: Some(1 + 7 + 1 + 69), key: tc_key::UPDATE_TLE },
        TRANSMIT_PACKET => HandlerSpec { auth_prefix_len: None, key: b"" },
        _ => return None,
    })
}

/// Verifies an HMAC-SHA1 tag in constant time (the `Mac::verify_slice`
/// comparison in the `hmac` crate is constant-time by construction).
fn verify_hmac(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha1::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}

/// Parses and authenticates one received telecommand packet.
///
/// `pkt[0]` is the packet ID, `pkt[1..8]` the requester callsign, and
/// (for authenticated commands) the trailing [`HMAC_TAG_LEN`] bytes are
/// the tag. On success, `last_valid_tc` side effects are the caller's
/// responsibility (kept out of this pure parsing function).
pub fn parse_and_authenticate(pkt: &[u8]) -> Result<AuthenticatedTc, TcError> {
    if pkt.is_empty() {
        return Err(TcError::TooShort { len: 0, need: 1 });
    }
    let packet_id = pkt[0];
    let spec = handler_spec(packet_id).ok_or(TcError::UnknownPacketId(packet_id))?;

    let min_len = 1 + CALLSIGN_FIELD_LEN;
    if pkt.len() < min_len {
        return Err(TcError::TooShort { len: pkt.len(), need: min_len });
    }
    let mut callsign = [0u8; CALLSIGN_FIELD_LEN];
    callsign.copy_from_slice(&pkt[1..1 + CALLSIGN_FIELD_LEN]);

    if let Some(prefix_len) = spec.auth_prefix_len {
        let need = prefix_len + HMAC_TAG_LEN;
        if pkt.len() < need {
            return Err(TcError::TooShort { len: pkt.len(), need });
        }
        let (message, rest) = pkt.split_at(prefix_len);
        let tag = &rest[..HMAC_TAG_LEN];
        if !verify_hmac(spec.key, message, tag) {
            warn!(target: "tc_processor", packet_id = format!("{packet_id:#04x}"), "HMAC authentication failed");
            return Err(TcError::AuthFailure);
        }
    }

    let request = decode_request(packet_id, pkt)?;
    info!(target: "tc_processor", packet_id = format!("{packet_id:#04x}"), "telecommand authenticated");
    Ok(AuthenticatedTc { callsign, request })
}

fn decode_request(packet_id: u8, pkt: &[u8]) -> Result<TcRequest, TcError> {
    use tc_id::*;
    let body = &pkt[1 + CALLSIGN_FIELD_LEN..];

    Ok(match packet_id {
        PING => TcRequest::Ping,
        DATA_REQUEST => {
            require(body.len() >= 9, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 9)?;
            TcRequest::DataRequest {
                data_id: body[0],
                start_idx: u32::from_be_bytes(body[1..5].try_into().unwrap()),
                end_idx: u32::from_be_bytes(body[5..9].try_into().unwrap()),
            }
        }
        BROADCAST => TcRequest::Broadcast { message: body.to_vec() },
        ENTER_HIBERNATION => {
            require(body.len() >= 2, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 2)?;
            TcRequest::EnterHibernation { hours: u16::from_be_bytes([body[0], body[1]]) }
        }
        LEAVE_HIBERNATION => TcRequest::LeaveHibernation,
        ACTIVATE_MODULE => {
            require(!body.is_empty(), pkt.len(), 1 + CALLSIGN_FIELD_LEN + 1)?;
            TcRequest::ActivateModule { module_id: body[0] }
        }
        DEACTIVATE_MODULE => {
            require(!body.is_empty(), pkt.len(), 1 + CALLSIGN_FIELD_LEN + 1)?;
            TcRequest::DeactivateModule { module_id: body[0] }
        }
        ACTIVATE_PAYLOAD => {
            require(!body.is_empty(), pkt.len(), 1 + CALLSIGN_FIELD_LEN + 1)?;
            TcRequest::ActivatePayload { payload: payload_from_id(body[0]) }
        }
        DEACTIVATE_PAYLOAD => {
            require(!body.is_empty(), pkt.len(), 1 + CALLSIGN_FIELD_LEN + 1)?;
            TcRequest::DeactivatePayload { payload: payload_from_id(body[0]) }
        }
        ERASE_MEMORY => TcRequest::EraseMemory,
        FORCE_RESET => TcRequest::ForceReset,
        GET_PAYLOAD_DATA => {
            require(body.len() >= 5, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 5)?;
            TcRequest::GetPayloadData {
                payload: payload_from_id(body[0]),
                offset: u32::from_be_bytes(body[1..5].try_into().unwrap()),
            }
        }
        SET_PARAMETER => {
            require(body.len() >= 6, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 6)?;
            TcRequest::SetParameter {
                subsystem: body[0],
                param_id: body[1],
                value: u32::from_be_bytes(body[2..6].try_into().unwrap()),
            }
        }
        GET_PARAMETER => {
            require(body.len() >= 2, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 2)?;
            TcRequest::GetParameter { subsystem: body[0], param_id: body[1] }
        }
        UPDATE_TLE => {
            require(body.len() >= 70, pkt.len(), 1 + CALLSIGN_FIELD_LEN + 70)?;
            let mut line = [0u8; 69];
            line.copy_from_slice(&body[1..70]);
            TcRequest::UpdateTle { line_number: body[0], line }
        }
        TRANSMIT_PACKET => TcRequest::TransmitPacket { payload: body.to_vec() },
        other => return Err(TcError::UnknownPacketId(other)),
    })
}

fn require(cond: bool, len: usize, need: usize) -> Result<(), TcError> {
    if cond {
        Ok(())
    } else {
        Err(TcError::TooShort { len, need })
    }
}

fn payload_from_id(id: u8) -> PayloadId {
    match id {
        0 => PayloadId::EdcA,
        1 => PayloadId::EdcB,
        2 => PayloadId::PayloadX,
        _ => PayloadId::None,
    }
}

fn payload_to_id(payload: PayloadId) -> u8 {
    match payload {
        PayloadId::None => 0xFF,
        PayloadId::EdcA => 0,
        PayloadId::EdcB => 1,
        PayloadId::PayloadX => 2,
    }
}

/// `SetParameter`/`GetParameter` only understand the OBDH subsystem today
/// (§4.5: "For OBDH param ..."); other subsystem IDs are accepted by the
/// wire format but have no backing state in this implementation.
pub mod subsystem_id {
    pub const OBDH: u8 = 0;
}

/// Parameter IDs `SetParameter`/`GetParameter` recognize for the OBDH
/// subsystem.
pub mod param_id {
    /// Operational mode — routed through the mission manager rather than
    /// written directly, since mode changes need MM confirmation (§4.5:
    /// "For OBDH param 'mode' waits for MM confirmation"). Values:
    /// 0 = Normal, 1 = StandBy, 2 = WakeUp.
    pub const MODE: u8 = 0;
    pub const MAIN_EDC: u8 = 1;
    pub const MANUAL_MODE: u8 = 2;
    pub const SYSTEM_TIME: u8 = 3;
    pub const PX_DURATION_MS: u8 = 4;
}

/// Applies a `SetParameter` request directly to shared state. `mode`
/// (routed through the mission manager) and `px_duration_ms` (routed
/// through the mission manager's own setter) are handled by the caller
/// before this is reached; this covers the remaining OBDH parameters.
pub fn apply_set_parameter(state: &mut SatelliteState, subsystem: u8, param: u8, value: u32) {
    if subsystem != subsystem_id::OBDH {
        warn!(target: "tc_processor", subsystem, "set-parameter for unknown subsystem ignored");
        return;
    }
    match param {
        param_id::MAIN_EDC => state.main_edc = payload_from_id(value as u8),
        param_id::MANUAL_MODE => state.manual_mode_on = value != 0,
        param_id::SYSTEM_TIME => state.ts_last_mode_change = value,
        other => warn!(target: "tc_processor", param_id = other, "set-parameter for unknown param ignored"),
    }
}

/// Reads a parameter for `GetParameter`, mirroring [`apply_set_parameter`]'s
/// ID table. Returns `0` for an unknown subsystem or parameter rather than
/// failing the command — an unauthenticated probe of an undefined ID gets
/// a defined (if meaningless) answer, not a dropped packet.
#[must_use]
pub fn read_parameter(state: &SatelliteState, subsystem: u8, param: u8) -> u32 {
    if subsystem != subsystem_id::OBDH {
        return 0;
    }
    match param {
        param_id::MODE => state.mode as u32,
        param_id::MAIN_EDC => u32::from(payload_to_id(state.main_edc)),
        param_id::MANUAL_MODE => u32::from(state.manual_mode_on),
        param_id::SYSTEM_TIME => state.ts_last_mode_change,
        _ => 0,
    }
}

/// Converts a request that changes mode/payload state into the mission
/// event it posts, for handlers that require MM action (§4.5 step 3).
/// `SetParameter(Obdh, "mode", _)` is included here rather than applied
/// directly, since §4.5 says mode changes "wait for MM confirmation."
#[must_use]
pub fn to_mission_event(request: &TcRequest) -> Option<MissionEvent> {
    match *request {
        TcRequest::EnterHibernation { hours } => {
            Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::Hibernation { hours }))
        }
        TcRequest::LeaveHibernation => Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp)),
        TcRequest::ActivatePayload { payload } => Some(MissionEvent::ActivatePayloadRequest(payload)),
        TcRequest::DeactivatePayload { payload } => Some(MissionEvent::DeactivatePayloadRequest(payload)),
        TcRequest::SetParameter { subsystem, param_id: param, value } if subsystem == subsystem_id::OBDH && param == param_id::MODE => {
            match value {
                0 => Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::Normal)),
                1 => Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::StandBy)),
                2 => Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Builds the generic feedback packet body (requester callsign + TC-ID +
/// a post-action timestamp), the default downlink answer for every
/// telecommand except the five with their own dedicated downlink format
/// (§4.5 step 4, §6 downlink IDs).
#[must_use]
pub fn build_feedback(callsign: &Callsign, tc_id: u8, post_action_timestamp_s: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + CALLSIGN_FIELD_LEN + 4);
    out.push(crate::config::downlink_id::TC_FEEDBACK);
    out.extend_from_slice(callsign);
    out.push(tc_id);
    out.extend_from_slice(&post_action_timestamp_s.to_be_bytes());
    out
}

/// Builds the Ping reply (§8 scenario 1): downlink ID `PING_ANSWER`
/// followed by the requester's own callsign bytes, echoed straight back —
/// "echo 7 bytes, no auth" (§4.5), since the 7-byte Ping payload *is* the
/// callsign.
#[must_use]
pub fn build_ping_answer(callsign: &Callsign) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 2 * CALLSIGN_FIELD_LEN);
    out.push(crate::config::downlink_id::PING_ANSWER);
    out.extend_from_slice(callsign);
    out.extend_from_slice(callsign);
    out
}

/// Builds the `GetParameter` reply: downlink ID `PARAMETER`, callsign,
/// subsystem, parameter ID, and the `u32` value read back.
#[must_use]
pub fn build_parameter_answer(callsign: &Callsign, subsystem: u8, param: u8, value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + CALLSIGN_FIELD_LEN + 2 + 4);
    out.push(crate::config::downlink_id::PARAMETER);
    out.extend_from_slice(callsign);
    out.push(subsystem);
    out.push(param);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// Builds the `DataRequest` reply: one `DATA_ANSWER` frame per page
/// returned, concatenated back to back (the "small inter-packet delay"
/// between real downlink transmissions has no analogue in this
/// synchronous command/response simulator).
#[must_use]
pub fn build_data_answer(callsign: &Callsign, data_id: u8, pages: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for page in pages {
        out.push(crate::config::downlink_id::DATA_ANSWER);
        out.extend_from_slice(callsign);
        out.push(data_id);
        out.extend_from_slice(page);
    }
    out
}

/// Builds the `GetPayloadData` reply: downlink ID `PAYLOAD_DATA`,
/// callsign, payload ID byte, the requested offset, and whatever bytes
/// were on hand for that payload's latest telemetry snapshot.
#[must_use]
pub fn build_payload_data_answer(callsign: &Callsign, payload: PayloadId, offset: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + CALLSIGN_FIELD_LEN + 1 + 4 + data.len());
    out.push(crate::config::downlink_id::PAYLOAD_DATA);
    out.extend_from_slice(callsign);
    out.push(payload_to_id(payload));
    out.extend_from_slice(&offset.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Builds the `Broadcast` reply: downlink ID `BROADCAST`, callsign, and
/// the message relayed verbatim — `Broadcast` carries no authentication
/// (§4.5), so there is nothing to check before relaying it.
#[must_use]
pub fn build_broadcast_answer(callsign: &Callsign, message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + CALLSIGN_FIELD_LEN + message.len());
    out.push(crate::config::downlink_id::BROADCAST);
    out.extend_from_slice(callsign);
    out.extend_from_slice(message);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac_tag(key: &[u8], msg: &[u8]) -> [u8; HMAC_TAG_LEN] {
        let mut mac = HmacSha1::new_from_slice(key).unwrap();
        mac.update(msg);
        let result = mac.finalize().into_bytes();
        let mut tag = [0u8; HMAC_TAG_LEN];
        tag.copy_from_slice(&result);
        tag
    }

    #[test]
    fn ping_requires_no_authentication() {
        let mut pkt = vec![tc_id::PING];
        pkt.extend_from_slice(b"PY0EFS\0");
        let tc = parse_and_authenticate(&pkt).unwrap();
        assert_eq!(tc.request, TcRequest::Ping);
    }

    #[test]
    fn hibernation_entry_authenticates_and_decodes_duration() {
        let mut msg = vec![tc_id::ENTER_HIBERNATION];
        msg.extend_from_slice(b"PY0EFS\0");
        msg.extend_from_slice(&0x1111u16.to_be_bytes());
        let tag = hmac_tag(tc_key::ENTER_HIBERNATION, &msg);

        let mut pkt = msg.clone();
        pkt.extend_from_slice(&tag);

        let tc = parse_and_authenticate(&pkt).unwrap();
        assert_eq!(tc.request, TcRequest::EnterHibernation { hours: 0x1111 });
        assert_eq!(
            to_mission_event(&tc.request),
            Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::Hibernation { hours: 0x1111 }))
        );
    }

    #[test]
    fn tampered_hmac_is_rejected() {
        let mut msg = vec![tc_id::FORCE_RESET];
        msg.extend_from_slice(b"PY0EFS\0");
        let mut tag = hmac_tag(tc_key::FORCE_RESET, &msg);
        tag[0] ^= 0xFF;

        let mut pkt = msg;
        pkt.extend_from_slice(&tag);

        assert_eq!(parse_and_authenticate(&pkt), Err(TcError::AuthFailure));
    }

    #[test]
    fn unknown_packet_id_is_rejected() {
        let pkt = vec![0x99];
        assert_eq!(parse_and_authenticate(&pkt), Err(TcError::UnknownPacketId(0x99)));
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let pkt = vec![tc_id::PING, b'P'];
        assert!(matches!(parse_and_authenticate(&pkt), Err(TcError::TooShort { .. })));
    }

    #[test]
    fn set_parameter_mode_is_routed_through_the_mission_manager() {
        let request = TcRequest::SetParameter { subsystem: subsystem_id::OBDH, param_id: param_id::MODE, value: 1 };
        assert_eq!(to_mission_event(&request), Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::StandBy)));
    }

    #[test]
    fn set_then_read_main_edc_round_trips() {
        let mut state = crate::satellite_state::SatelliteState::default();
        apply_set_parameter(&mut state, subsystem_id::OBDH, param_id::MAIN_EDC, 1);
        assert_eq!(read_parameter(&state, subsystem_id::OBDH, param_id::MAIN_EDC), 1);
        assert_eq!(state.main_edc, PayloadId::EdcB);
    }

    #[test]
    fn ping_answer_echoes_the_callsign_twice() {
        let call = *b"PY0EFS\0";
        let answer = build_ping_answer(&call);
        assert_eq!(answer[0], crate::config::downlink_id::PING_ANSWER);
        assert_eq!(&answer[1..8], &call);
        assert_eq!(&answer[8..15], &call);
    }

    #[test]
    fn get_payload_data_auth_prefix_matches_its_own_decoded_body() {
        let call = [0u8; 7];
        let mut body = vec![1u8];
        body.extend_from_slice(&7u32.to_be_bytes());
        let pkt = signed_for_test(tc_id::GET_PAYLOAD_DATA, body, call, tc_key::GET_PAYLOAD_DATA);

        let tc = parse_and_authenticate(&pkt).unwrap();
        assert_eq!(tc.request, TcRequest::GetPayloadData { payload: PayloadId::EdcB, offset: 7 });
    }

    fn signed_for_test(packet_id: u8, mut body: Vec<u8>, call: [u8; 7], key: &[u8]) -> Vec<u8> {
        let mut pkt = vec![packet_id];
        pkt.extend_from_slice(&call);
        pkt.append(&mut body);
        let mut mac = HmacSha1::new_from_slice(key).unwrap();
        mac.update(&pkt);
        pkt.extend_from_slice(&mac.finalize().into_bytes());
        pkt
    }
}
