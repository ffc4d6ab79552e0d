use hmac::{Hmac, Mac};
use obdh_core::config::{downlink_id, tc_id, tc_key, HMAC_TAG_LEN};
use obdh_core::mission_manager::{MissionEvent, ModeChangeRequest};
use obdh_core::satellite_state::PayloadId;
use obdh_core::tc_processor::{build_feedback, parse_and_authenticate, to_mission_event, TcError, TcRequest};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

fn callsign(name: &[u8]) -> [u8; 7] {
    let mut out = [0u8; 7];
    out[..name.len()].copy_from_slice(name);
    out
}

fn signed(packet_id: u8, mut body: Vec<u8>, call: [u8; 7], key: &[u8]) -> Vec<u8> {
    let mut pkt = vec![packet_id];
    pkt.extend_from_slice(&call);
    pkt.append(&mut body);
    let mut mac = HmacSha1::new_from_slice(key).unwrap();
    mac.update(&pkt);
    pkt.extend_from_slice(&mac.finalize().into_bytes());
    pkt
}

#[test]
fn data_request_decodes_range_and_requires_its_own_key() {
    let call = callsign(b"GS0001");
    let mut body = vec![0u8];
    body.extend_from_slice(&10u32.to_be_bytes());
    body.extend_from_slice(&20u32.to_be_bytes());
    let pkt = signed(tc_id::DATA_REQUEST, body, call, tc_key::DATA_REQUEST);

    let tc = parse_and_authenticate(&pkt).unwrap();
    assert_eq!(tc.request, TcRequest::DataRequest { data_id: 0, start_idx: 10, end_idx: 20 });
    assert_eq!(tc.callsign, call);
}

#[test]
fn activate_payload_maps_byte_to_payload_id_and_posts_mission_event() {
    let call = callsign(b"GS0002");
    let pkt = signed(tc_id::ACTIVATE_PAYLOAD, vec![1], call, tc_key::ACTIVATE_PAYLOAD);

    let tc = parse_and_authenticate(&pkt).unwrap();
    assert_eq!(tc.request, TcRequest::ActivatePayload { payload: PayloadId::EdcB });
    assert_eq!(to_mission_event(&tc.request), Some(MissionEvent::ActivatePayloadRequest(PayloadId::EdcB)));
}

#[test]
fn update_tle_requires_exactly_69_byte_line() {
    let call = callsign(b"GS0003");
    let mut line_body = vec![1u8];
    line_body.extend_from_slice(&[b'1'; 69]);
    let pkt = signed(tc_id::UPDATE_TLE, line_body, call, tc_key::UPDATE_TLE);

    let tc = parse_and_authenticate(&pkt).unwrap();
    match tc.request {
        TcRequest::UpdateTle { line_number, line } => {
            assert_eq!(line_number, 1);
            assert_eq!(line.len(), 69);
        }
        other => panic!("expected UpdateTle, got {other:?}"),
    }
}

#[test]
fn transmit_packet_and_broadcast_carry_no_authentication() {
    let call = callsign(b"GS0004");
    let mut pkt = vec![tc_id::TRANSMIT_PACKET];
    pkt.extend_from_slice(&call);
    pkt.extend_from_slice(b"hello space");

    let tc = parse_and_authenticate(&pkt).unwrap();
    assert_eq!(tc.request, TcRequest::TransmitPacket { payload: b"hello space".to_vec() });
}

#[test]
fn leave_hibernation_maps_to_wakeup_event() {
    let call = callsign(b"GS0005");
    let pkt = signed(tc_id::LEAVE_HIBERNATION, vec![], call, tc_key::LEAVE_HIBERNATION);

    let tc = parse_and_authenticate(&pkt).unwrap();
    assert_eq!(
        to_mission_event(&tc.request),
        Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp))
    );
}

#[test]
fn short_authenticated_body_is_rejected_before_hmac_check() {
    // ENTER_HIBERNATION needs a 2-byte duration; give it zero bytes and an
    // otherwise-valid-length trailing tag so the truncation is caught by
    // length validation, not by accident passing HMAC.
    let call = callsign(b"GS0006");
    let mut pkt = vec![tc_id::ENTER_HIBERNATION];
    pkt.extend_from_slice(&call);
    pkt.extend_from_slice(&[0u8; HMAC_TAG_LEN]);

    assert!(matches!(parse_and_authenticate(&pkt), Err(TcError::TooShort { .. })));
}

#[test]
fn build_feedback_echoes_callsign_and_tc_id() {
    let call = callsign(b"GS0007");
    let feedback = build_feedback(&call, tc_id::PING, 12_345);

    assert_eq!(feedback[0], downlink_id::TC_FEEDBACK);
    assert_eq!(&feedback[1..8], &call);
    assert_eq!(feedback[8], tc_id::PING);
    assert_eq!(u32::from_be_bytes(feedback[9..13].try_into().unwrap()), 12_345);
}
